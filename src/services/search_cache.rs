use crate::models::{CachedSearch, SearchCriteria, ZipCodeSet};
use crate::services::session::{SessionError, SessionId, SessionStore};
use chrono::Utc;
use std::sync::Arc;

/// Session key holding the serialized [`CachedSearch`]
pub const SEARCH_SESSION_KEY: &str = "search";

/// Keeps each visitor's last successful search between the submission and
/// the results request.
///
/// Criteria and zip codes are written together as one document, so a
/// session never holds criteria from one search next to zip codes from
/// another.
#[derive(Clone)]
pub struct SearchSessionCache {
    store: Arc<dyn SessionStore>,
}

impl SearchSessionCache {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Overwrite the session's cached search
    pub async fn store(
        &self,
        session: &SessionId,
        criteria: SearchCriteria,
        zip_codes: ZipCodeSet,
    ) -> Result<CachedSearch, SessionError> {
        let cached = CachedSearch {
            criteria,
            zip_codes,
            searched_at: Utc::now(),
        };

        let json = serde_json::to_string(&cached)?;
        self.store.set(session, SEARCH_SESSION_KEY, json).await?;

        tracing::debug!("Cached search for session {} ({} zip codes)", session, cached.zip_codes.len());
        Ok(cached)
    }

    /// The session's cached search, or `None` when nothing was stored.
    ///
    /// An entry that no longer deserializes is treated as absent.
    pub async fn load(&self, session: &SessionId) -> Result<Option<CachedSearch>, SessionError> {
        let Some(json) = self.store.get(session, SEARCH_SESSION_KEY).await? else {
            tracing::debug!("No cached search for session {}", session);
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                tracing::warn!("Discarding unreadable cached search for session {}: {}", session, e);
                Ok(None)
            }
        }
    }

    pub async fn clear(&self, session: &SessionId) -> Result<(), SessionError> {
        self.store.remove(session, SEARCH_SESSION_KEY).await
    }
}
