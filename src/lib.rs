//! Hook Find - radius search for nearby musicians and bands
//!
//! This library provides the search pipeline behind the Hook Find site:
//! criteria resolution, zip code radius lookup, per-session caching of the
//! last search, and candidate filtering against the user directory.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{CandidateFilter, CriteriaResolver, SearchError, Vocabulary};
pub use crate::models::{CachedSearch, Role, SearchCriteria, SearchRequest, UserRecord, ZipCode, ZipCodeSet};
pub use crate::services::{GeocodeClient, GeocodeError, SearchSessionCache, SessionStore, UserDirectory};
