// Core search pipeline exports
pub mod candidates;
pub mod criteria;
pub mod filters;
pub mod vocabulary;

pub use candidates::{CandidateFilter, SearchError, TermKind};
pub use criteria::{CriteriaError, CriteriaResolver, DEFAULT_RADIUS_MILES};
pub use filters::matches_candidate;
pub use vocabulary::{title_case, Term, TermList, Vocabulary, VocabularyError};
