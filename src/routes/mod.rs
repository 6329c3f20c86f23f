// Route exports
pub mod context;
pub mod search;

use actix_web::web;

pub use context::{RequestContext, CURRENT_USER_KEY};
pub use search::{AppState, RESULTS_PATH, SEARCH_PATH};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(search::configure);
}
