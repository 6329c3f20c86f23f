use crate::config::SessionSettings;
use crate::services::{SessionError, SessionId, SessionStore};
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::HttpRequest;

/// Session key written by the login flow with the signed-in user's id
pub const CURRENT_USER_KEY: &str = "curr_user";

/// Per-request identity, built explicitly at the top of every handler
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: SessionId,
    pub current_user: Option<i64>,
    is_new_session: bool,
}

impl RequestContext {
    /// Read the session cookie and the signed-in user, if any.
    ///
    /// A missing or unrecognised cookie yields a fresh session that has no
    /// state yet.
    pub async fn from_request(
        req: &HttpRequest,
        settings: &SessionSettings,
        sessions: &dyn SessionStore,
    ) -> Result<Self, SessionError> {
        let existing = req
            .cookie(&settings.cookie_name)
            .and_then(|cookie| SessionId::parse(cookie.value()));

        let Some(session_id) = existing else {
            return Ok(Self {
                session_id: SessionId::generate(),
                current_user: None,
                is_new_session: true,
            });
        };

        let current_user = sessions
            .get(&session_id, CURRENT_USER_KEY)
            .await?
            .and_then(|raw| serde_json::from_str::<i64>(&raw).ok());

        Ok(Self {
            session_id,
            current_user,
            is_new_session: false,
        })
    }

    pub fn is_new_session(&self) -> bool {
        self.is_new_session
    }

    /// Cookie to attach when this request started the session
    pub fn session_cookie(&self, settings: &SessionSettings) -> Option<Cookie<'static>> {
        if !self.is_new_session {
            return None;
        }

        let max_age = i64::try_from(settings.ttl_secs).unwrap_or(i64::MAX);
        Some(
            Cookie::build(settings.cookie_name.clone(), self.session_id.to_string())
                .path("/")
                .http_only(true)
                .secure(settings.secure_cookie)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(max_age))
                .finish(),
        )
    }
}
