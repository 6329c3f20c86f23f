use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use hook_find::config::{SessionBackend, Settings};
use hook_find::core::{CandidateFilter, CriteriaResolver, Vocabulary};
use hook_find::routes::{self, AppState};
use hook_find::services::{
    GeocodeClient, MemorySessionStore, PostgresDirectory, RedisSessionStore, SearchSessionCache, SessionStore,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// JSON error response for malformed payloads
#[derive(Debug, serde::Serialize)]
pub struct PayloadError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for PayloadError {}

impl error::ResponseError for PayloadError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)).json(self)
    }
}

/// Handle form payload errors
pub fn handle_form_payload_error(err: error::UrlencodedError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("Form payload error on {}: {}", req.path(), err);
    PayloadError {
        error: "invalid_form".to_string(),
        message: format!("Invalid form: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    PayloadError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting Hook Find search service...");

    let vocabulary = Arc::new(
        Vocabulary::load(&settings.vocabulary).map_err(|e| startup_error("Failed to load vocabulary", e))?,
    );

    info!(
        "Vocabulary loaded ({} instruments, {} genres)",
        vocabulary.instruments.len(),
        vocabulary.genres.len()
    );

    let geocode = Arc::new(
        GeocodeClient::from_settings(&settings.geocode)
            .map_err(|e| startup_error("Failed to create geocode client", e))?,
    );

    info!("Geocode client initialized (timeout: {}s)", settings.geocode.timeout_secs);

    let sessions: Arc<dyn SessionStore> = match settings.session.backend {
        SessionBackend::Redis => {
            let redis_url = settings
                .session
                .redis_url
                .as_deref()
                .ok_or_else(|| startup_error("Session configuration error", "session.redis_url is required for the redis backend"))?;
            let store = RedisSessionStore::new(redis_url, settings.session.ttl_secs)
                .await
                .map_err(|e| startup_error("Failed to connect to Redis", e))?;
            info!("Redis session store initialized (TTL: {}s)", settings.session.ttl_secs);
            Arc::new(store)
        }
        SessionBackend::Memory => {
            info!(
                "In-memory session store initialized ({} entries, TTL: {}s)",
                settings.session.capacity, settings.session.ttl_secs
            );
            Arc::new(MemorySessionStore::new(settings.session.capacity, settings.session.ttl_secs))
        }
    };

    let directory = Arc::new(
        PostgresDirectory::from_settings(&settings.database)
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?,
    );

    directory
        .sync_vocabulary(&vocabulary)
        .await
        .map_err(|e| startup_error("Failed to sync vocabulary", e))?;

    info!("PostgreSQL directory initialized");

    let app_state = AppState {
        geocode,
        search_cache: SearchSessionCache::new(sessions.clone()),
        sessions,
        directory,
        resolver: CriteriaResolver::new(vocabulary, settings.search.default_radius_miles),
        candidates: CandidateFilter::new(settings.search.exclude_requester),
        session_settings: settings.session.clone(),
        max_radius_miles: settings.search.max_radius_miles,
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::FormConfig::default().error_handler(handle_form_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
