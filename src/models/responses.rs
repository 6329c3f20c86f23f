use serde::{Deserialize, Serialize};
use crate::core::vocabulary::Term;
use crate::models::domain::{Role, SearchCriteria};

/// Profile type option on the search form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChoice {
    pub value: bool,
    pub label: String,
}

impl From<Role> for RoleChoice {
    fn from(role: Role) -> Self {
        Self {
            value: role.is_band(),
            label: role.label().to_string(),
        }
    }
}

/// Everything a client needs to draw the search form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFormResponse {
    pub roles: Vec<RoleChoice>,
    pub instruments: Vec<Term>,
    pub genres: Vec<Term>,
    pub default_radius_miles: u32,
    pub min_radius_miles: u32,
    pub max_radius_miles: u32,
    /// Criteria of the visitor's last successful search, if any
    pub current: Option<SearchCriteria>,
}

/// One candidate as shown on the results page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: i64,
    pub username: String,
    pub is_band: bool,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: String,
    pub profile_image: Option<String>,
    pub instruments: Vec<String>,
    pub genres: Vec<String>,
}

/// Response for the results page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultsResponse {
    pub criteria: SearchCriteria,
    pub zip_codes_searched: usize,
    pub results: Vec<CandidateSummary>,
    pub total_results: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub status_code: u16,
}
