// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{CachedSearch, CandidateQuery, InvalidZipCode, Role, SearchCriteria, UserRecord, VocabularyEntry, ZipCode, ZipCodeSet};
pub use requests::SearchRequest;
pub use responses::{CandidateSummary, ErrorResponse, HealthResponse, RoleChoice, SearchFormResponse, SearchResultsResponse};
