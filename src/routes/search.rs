use crate::config::SessionSettings;
use crate::core::{CandidateFilter, CriteriaResolver, SearchError};
use crate::models::{
    CandidateSummary, ErrorResponse, HealthResponse, Role, RoleChoice, SearchFormResponse, SearchRequest,
    SearchResultsResponse, UserRecord,
};
use crate::routes::context::RequestContext;
use crate::services::{GeocodeClient, SearchSessionCache, SessionError, SessionStore, UserDirectory};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::TryStreamExt;
use std::sync::Arc;

/// Path of the search form, where visitors without a search are sent
pub const SEARCH_PATH: &str = "/search";
/// Path of the results page
pub const RESULTS_PATH: &str = "/results";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub geocode: Arc<GeocodeClient>,
    pub sessions: Arc<dyn SessionStore>,
    pub search_cache: SearchSessionCache,
    pub directory: Arc<dyn UserDirectory>,
    pub resolver: CriteriaResolver,
    pub candidates: CandidateFilter,
    pub session_settings: SessionSettings,
    pub max_radius_miles: u32,
}

/// Configure all search-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route(SEARCH_PATH, web::get().to(search_form))
        .route(SEARCH_PATH, web::post().to(submit_search))
        .route(SEARCH_PATH, web::delete().to(clear_search))
        .route(RESULTS_PATH, web::get().to(search_results));
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn internal_error(error: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse {
        error: error.to_string(),
        message: "Something went wrong on our side. Please try again.".to_string(),
        field: None,
        status_code: 500,
    })
}

fn session_failure(e: SessionError) -> HttpResponse {
    tracing::error!("Session store failure: {}", e);
    internal_error("session_unavailable")
}

async fn request_context(req: &HttpRequest, state: &AppState) -> Result<RequestContext, HttpResponse> {
    RequestContext::from_request(req, &state.session_settings, state.sessions.as_ref())
        .await
        .map_err(session_failure)
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let directory_healthy = state.directory.health_check().await;

    let status = if directory_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Search form description
///
/// GET /search
async fn search_form(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let ctx = match request_context(&req, &state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let current = if ctx.is_new_session() {
        None
    } else {
        match state.search_cache.load(&ctx.session_id).await {
            Ok(cached) => cached.map(|c| c.criteria),
            Err(e) => return session_failure(e),
        }
    };

    let vocabulary = state.resolver.vocabulary();

    HttpResponse::Ok().json(SearchFormResponse {
        roles: vec![RoleChoice::from(Role::Musician), RoleChoice::from(Role::Band)],
        instruments: vocabulary.instruments.terms().to_vec(),
        genres: vocabulary.genres.terms().to_vec(),
        default_radius_miles: state.resolver.default_radius_miles(),
        min_radius_miles: 0,
        max_radius_miles: state.max_radius_miles,
        current,
    })
}

/// Search submission
///
/// POST /search (application/x-www-form-urlencoded)
///
/// Fields: `is_band`, `instruments`, `genres`, `zip_code`, `radius`.
/// On success the criteria and zip codes are cached in the session and the
/// client is redirected to `/results`.
async fn submit_search(
    state: web::Data<AppState>,
    form: web::Form<SearchRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let ctx = match request_context(&req, &state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let criteria = match state.resolver.resolve(&form) {
        Ok(criteria) => criteria,
        Err(e) => {
            tracing::info!("Rejected search for session {}: {} ({})", ctx.session_id, e, e.field());
            return HttpResponse::UnprocessableEntity().json(ErrorResponse {
                error: "validation_failed".to_string(),
                message: e.to_string(),
                field: Some(e.field().to_string()),
                status_code: 422,
            });
        }
    };

    let zip_codes = match state
        .geocode
        .resolve_radius(&criteria.origin_zip, criteria.radius_miles)
        .await
    {
        Ok(zip_codes) => zip_codes,
        Err(e) => {
            tracing::warn!(
                "Radius lookup failed for {} within {} miles: {}",
                criteria.origin_zip,
                criteria.radius_miles,
                e
            );
            let reason = e.reason();
            return HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: "geocode_unavailable".to_string(),
                message: reason.user_message().to_string(),
                field: None,
                status_code: 503,
            });
        }
    };

    tracing::info!(
        "Search by session {} (user {:?}): {:?} playing {} / {} within {} miles of {} -> {} zip codes",
        ctx.session_id,
        ctx.current_user,
        criteria.role,
        criteria.instrument,
        criteria.genre,
        criteria.radius_miles,
        criteria.origin_zip,
        zip_codes.len()
    );

    if let Err(e) = state.search_cache.store(&ctx.session_id, criteria, zip_codes).await {
        return session_failure(e);
    }

    let mut response = HttpResponse::SeeOther();
    response.insert_header((header::LOCATION, RESULTS_PATH));
    if let Some(cookie) = ctx.session_cookie(&state.session_settings) {
        response.cookie(cookie);
    }
    response.finish()
}

/// Results for the session's cached search
///
/// GET /results
///
/// Visitors without a cached search are sent back to the form.
async fn search_results(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let ctx = match request_context(&req, &state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    if ctx.is_new_session() {
        return redirect(SEARCH_PATH);
    }

    let cached = match state.search_cache.load(&ctx.session_id).await {
        Ok(Some(cached)) => cached,
        Ok(None) => return redirect(SEARCH_PATH),
        Err(e) => return session_failure(e),
    };

    let candidates = state
        .candidates
        .find_candidates(
            state.directory.as_ref(),
            &cached.criteria,
            &cached.zip_codes,
            ctx.current_user,
        )
        .await;

    let users: Vec<UserRecord> = match candidates {
        Ok(stream) => match stream.try_collect().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("Directory failed while streaming candidates: {}", e);
                return internal_error("directory_unavailable");
            }
        },
        Err(SearchError::ConfigurationFault { kind, name }) => {
            tracing::error!(
                "Configuration fault: {} {:?} is in the search vocabulary but not in the directory",
                kind,
                name
            );
            return internal_error("internal_error");
        }
        Err(SearchError::Directory(e)) => {
            tracing::error!("Directory lookup failed: {}", e);
            return internal_error("directory_unavailable");
        }
    };

    let vocabulary = state.resolver.vocabulary();
    let results: Vec<CandidateSummary> = users
        .into_iter()
        .map(|user| CandidateSummary {
            id: user.id,
            username: user.username,
            is_band: user.is_band,
            city: user.city,
            state: user.state,
            zip_code: user.zip_code,
            profile_image: user.profile_image,
            instruments: user
                .instruments
                .iter()
                .map(|token| vocabulary.instruments.display(token).map_or_else(|| token.clone(), str::to_string))
                .collect(),
            genres: user
                .genres
                .iter()
                .map(|token| vocabulary.genres.display(token).map_or_else(|| token.clone(), str::to_string))
                .collect(),
        })
        .collect();

    tracing::info!(
        "Returning {} results for session {} ({} zip codes searched)",
        results.len(),
        ctx.session_id,
        cached.zip_codes.len()
    );

    HttpResponse::Ok().json(SearchResultsResponse {
        total_results: results.len(),
        zip_codes_searched: cached.zip_codes.len(),
        criteria: cached.criteria,
        results,
    })
}

/// Forget the session's cached search
///
/// DELETE /search
async fn clear_search(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let ctx = match request_context(&req, &state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    if !ctx.is_new_session() {
        if let Err(e) = state.search_cache.clear(&ctx.session_id).await {
            return session_failure(e);
        }
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TermList, Vocabulary};
    use crate::models::ZipCode;
    use crate::services::{InMemoryDirectory, MemorySessionStore, SessionId};
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::time::Duration;

    fn vocabulary() -> Vocabulary {
        Vocabulary::new(
            TermList::from_tokens(["acoustic guitar", "drums", "lead guitar"]),
            TermList::from_tokens(["rock", "jazz", "metal"]),
        )
    }

    fn user(id: i64, name: &str, zip: &str, is_band: bool, instruments: &[&str], genres: &[&str]) -> UserRecord {
        UserRecord {
            id,
            username: name.to_string(),
            is_band,
            zip_code: zip.to_string(),
            city: Some("Auburn".to_string()),
            state: Some("AL".to_string()),
            bio: None,
            profile_image: None,
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
            genres: genres.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn create_state(geocode_url: &str, directory: InMemoryDirectory) -> (AppState, Arc<MemorySessionStore>) {
        let vocabulary = Arc::new(vocabulary());
        let sessions = Arc::new(MemorySessionStore::new(100, 60));

        let state = AppState {
            geocode: Arc::new(GeocodeClient::new(geocode_url, "key", "radius.json", Duration::from_secs(2)).unwrap()),
            sessions: sessions.clone(),
            search_cache: SearchSessionCache::new(sessions.clone()),
            directory: Arc::new(directory),
            resolver: CriteriaResolver::new(vocabulary, 10),
            candidates: CandidateFilter::default(),
            session_settings: SessionSettings::default(),
            max_radius_miles: 100,
        };

        (state, sessions)
    }

    fn seeded_directory() -> InMemoryDirectory {
        let mut directory = InMemoryDirectory::with_vocabulary(&vocabulary());
        directory.insert_user(user(1, "drummer", "36830", false, &["drums"], &["rock"]));
        directory.insert_user(user(2, "faraway", "99999", false, &["drums"], &["rock"]));
        directory.insert_user(user(3, "theband", "36832", true, &["drums"], &["rock"]));
        directory
    }

    fn search_form_body() -> [(&'static str, &'static str); 5] {
        [
            ("is_band", "False"),
            ("instruments", "drums"),
            ("genres", "rock"),
            ("zip_code", "36830"),
            ("radius", "10"),
        ]
    }

    #[actix_web::test]
    async fn test_submit_then_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/key/radius.json/36830/10/miles")
            .with_status(200)
            .with_body(r#"{"zip_codes":[{"zip_code":"36830"},{"zip_code":"36832"}]}"#)
            .create_async()
            .await;

        let (state, _) = create_state(&server.url(), seeded_directory());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri(SEARCH_PATH)
            .set_form(search_form_body())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), RESULTS_PATH);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == "hook_session")
            .expect("session cookie")
            .into_owned();

        let req = test::TestRequest::get().uri(RESULTS_PATH).cookie(cookie).to_request();
        let body: SearchResultsResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.total_results, 1);
        assert_eq!(body.results[0].username, "drummer");
        assert_eq!(body.results[0].instruments, vec!["Drums"]);
        assert_eq!(body.zip_codes_searched, 2);
        assert_eq!(body.criteria.radius_miles, 10);
    }

    #[actix_web::test]
    async fn test_results_without_session_redirects_to_form() {
        let (state, _) = create_state("http://127.0.0.1:9", seeded_directory());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri(RESULTS_PATH).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), SEARCH_PATH);

        let session = SessionId::generate();
        let req = test::TestRequest::get()
            .uri(RESULTS_PATH)
            .cookie(Cookie::new("hook_session", session.to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), SEARCH_PATH);
    }

    #[actix_web::test]
    async fn test_geocode_failure_keeps_previous_search() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/key/radius.json/36830/10/miles")
            .with_status(200)
            .with_body(r#"{"error_code":429,"error_msg":"Usage limit exceeded."}"#)
            .create_async()
            .await;

        let (state, _) = create_state(&server.url(), seeded_directory());
        let search_cache = state.search_cache.clone();
        let session = SessionId::generate();
        let previous = search_cache
            .store(
                &session,
                crate::models::SearchCriteria {
                    role: Role::Band,
                    instrument: "drums".to_string(),
                    genre: "rock".to_string(),
                    origin_zip: ZipCode::parse("36832").unwrap(),
                    radius_miles: 5,
                },
                [ZipCode::parse("36832").unwrap()].into_iter().collect(),
            )
            .await
            .unwrap();

        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri(SEARCH_PATH)
            .cookie(Cookie::new("hook_session", session.to_string()))
            .set_form(search_form_body())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "geocode_unavailable");

        assert_eq!(search_cache.load(&session).await.unwrap(), Some(previous));
    }

    #[actix_web::test]
    async fn test_validation_error_writes_nothing() {
        let (state, _) = create_state("http://127.0.0.1:9", seeded_directory());
        let search_cache = state.search_cache.clone();
        let session = SessionId::generate();
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri(SEARCH_PATH)
            .cookie(Cookie::new("hook_session", session.to_string()))
            .set_form([("is_band", "False"), ("instruments", "Drums"), ("genres", "rock"), ("zip_code", "36830")])
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.field.as_deref(), Some("instruments"));
        assert!(search_cache.load(&session).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_configuration_fault_is_internal_error() {
        let (state, sessions) = create_state("http://127.0.0.1:9", InMemoryDirectory::new());
        let session = SessionId::generate();
        SearchSessionCache::new(sessions)
            .store(
                &session,
                crate::models::SearchCriteria {
                    role: Role::Musician,
                    instrument: "drums".to_string(),
                    genre: "rock".to_string(),
                    origin_zip: ZipCode::parse("36830").unwrap(),
                    radius_miles: 10,
                },
                [ZipCode::parse("36830").unwrap()].into_iter().collect(),
            )
            .await
            .unwrap();

        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri(RESULTS_PATH)
            .cookie(Cookie::new("hook_session", session.to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_search_form_lists_vocabulary() {
        let (state, _) = create_state("http://127.0.0.1:9", seeded_directory());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;

        let body: SearchFormResponse =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri(SEARCH_PATH).to_request()).await;

        assert_eq!(body.roles.len(), 2);
        assert_eq!(body.roles[0].label, "Musicians");
        assert_eq!(body.instruments[0].display, "Acoustic Guitar");
        assert_eq!(body.default_radius_miles, 10);
        assert_eq!(body.max_radius_miles, 100);
        assert!(body.current.is_none());
    }

    #[actix_web::test]
    async fn test_clear_search() {
        let (state, _) = create_state("http://127.0.0.1:9", seeded_directory());
        let search_cache = state.search_cache.clone();
        let session = SessionId::generate();
        search_cache
            .store(
                &session,
                crate::models::SearchCriteria {
                    role: Role::Musician,
                    instrument: "drums".to_string(),
                    genre: "rock".to_string(),
                    origin_zip: ZipCode::parse("36830").unwrap(),
                    radius_miles: 10,
                },
                [ZipCode::parse("36830").unwrap()].into_iter().collect(),
            )
            .await
            .unwrap();

        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
        let req = test::TestRequest::delete()
            .uri(SEARCH_PATH)
            .cookie(Cookie::new("hook_session", session.to_string()))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(search_cache.load(&session).await.unwrap().is_none());
    }
}
