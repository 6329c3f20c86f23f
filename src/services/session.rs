use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur with session storage
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Opaque per-visitor session identifier carried in a cookie
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept only identifiers this service could have issued
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::try_parse(raw.trim())
            .ok()
            .map(|id| Self(id.simple().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side key-value state scoped to one visitor session
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<String>, SessionError>;

    /// Replace the value stored under `key`
    async fn set(&self, session: &SessionId, key: &str, value: String) -> Result<(), SessionError>;

    async fn remove(&self, session: &SessionId, key: &str) -> Result<(), SessionError>;
}

/// Storage key builder
pub struct SessionKey;

impl SessionKey {
    /// Build the storage key for one value of one session
    pub fn entry(session: &SessionId, key: &str) -> String {
        format!("session:{}:{}", session, key)
    }
}

/// Session store kept in process memory
///
/// Entries expire after the session TTL. Suitable for a single instance
/// and for tests.
pub struct MemorySessionStore {
    entries: moka::future::Cache<String, String>,
}

impl MemorySessionStore {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let entries = moka::future::CacheBuilder::new(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { entries }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(&SessionKey::entry(session, key)).await)
    }

    async fn set(&self, session: &SessionId, key: &str, value: String) -> Result<(), SessionError> {
        self.entries.insert(SessionKey::entry(session, key), value).await;
        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<(), SessionError> {
        self.entries.invalidate(&SessionKey::entry(session, key)).await;
        Ok(())
    }
}

/// Session store shared across instances through Redis
pub struct RedisSessionStore {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, SessionError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self { redis, ttl_secs })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(SessionKey::entry(session, key))
            .query_async(&mut conn)
            .await?;

        tracing::trace!("Session get {}:{} hit={}", session, key, value.is_some());
        Ok(value)
    }

    async fn set(&self, session: &SessionId, key: &str, value: String) -> Result<(), SessionError> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("SETEX")
            .arg(SessionKey::entry(session, key))
            .arg(self.ttl_secs)
            .arg(value)
            .query_async(&mut conn)
            .await?;

        tracing::trace!("Session set {}:{}", session, key);
        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<(), SessionError> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("DEL")
            .arg(SessionKey::entry(session, key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
