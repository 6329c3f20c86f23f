// Service exports
pub mod directory;
pub mod geocode;
pub mod search_cache;
pub mod session;

pub use directory::{CandidateStream, DirectoryError, InMemoryDirectory, PostgresDirectory, UserDirectory};
pub use geocode::{GeocodeClient, GeocodeError, GeocodeFailureReason};
pub use search_cache::{SearchSessionCache, SEARCH_SESSION_KEY};
pub use session::{MemorySessionStore, RedisSessionStore, SessionError, SessionId, SessionKey, SessionStore};
