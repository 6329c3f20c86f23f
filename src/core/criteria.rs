use crate::core::vocabulary::Vocabulary;
use crate::models::{Role, SearchCriteria, SearchRequest, ZipCode};
use std::sync::Arc;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Radius used when the form leaves it out
pub const DEFAULT_RADIUS_MILES: u32 = 10;

/// User-correctable problems with a search submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriteriaError {
    #[error("Please choose whether you are looking for musicians or bands.")]
    MissingRole,

    #[error("Unrecognised profile type {0:?}.")]
    InvalidRole(String),

    #[error("Please choose an instrument.")]
    MissingInstrument,

    #[error("{0:?} is not an instrument we know about.")]
    UnknownInstrument(String),

    #[error("Please choose a genre.")]
    MissingGenre,

    #[error("{0:?} is not a genre we know about.")]
    UnknownGenre(String),

    #[error("Please enter a valid zip code.")]
    InvalidZip(Option<String>),

    #[error("Radius must be a whole number of miles.")]
    InvalidRadius(String),

    #[error("Radius cannot be negative.")]
    NegativeRadius(i64),
}

impl CriteriaError {
    /// Form field the message belongs next to
    pub fn field(&self) -> &'static str {
        match self {
            CriteriaError::MissingRole | CriteriaError::InvalidRole(_) => "is_band",
            CriteriaError::MissingInstrument | CriteriaError::UnknownInstrument(_) => "instruments",
            CriteriaError::MissingGenre | CriteriaError::UnknownGenre(_) => "genres",
            CriteriaError::InvalidZip(_) => "zip_code",
            CriteriaError::InvalidRadius(_) | CriteriaError::NegativeRadius(_) => "radius",
        }
    }
}

/// Turns raw form input into canonical [`SearchCriteria`].
///
/// Checks run in form order (role, instrument, genre, zip, radius) and the
/// first failure is reported. Resolution is pure: nothing is read or
/// written besides the request and the static vocabulary.
#[derive(Debug, Clone)]
pub struct CriteriaResolver {
    vocabulary: Arc<Vocabulary>,
    default_radius_miles: u32,
}

impl CriteriaResolver {
    pub fn new(vocabulary: Arc<Vocabulary>, default_radius_miles: u32) -> Self {
        Self {
            vocabulary,
            default_radius_miles,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn default_radius_miles(&self) -> u32 {
        self.default_radius_miles
    }

    pub fn resolve(&self, raw: &SearchRequest) -> Result<SearchCriteria, CriteriaError> {
        let role = parse_role(raw.is_band.as_deref())?;

        let structural = raw.validate().err();
        let rejected = |field: &str| {
            structural
                .as_ref()
                .is_some_and(|errors: &ValidationErrors| errors.field_errors().contains_key(field))
        };

        let instrument = match raw.instruments.as_deref().map(str::trim) {
            None | Some("") => return Err(CriteriaError::MissingInstrument),
            Some(token) if rejected("instruments") || !self.vocabulary.instruments.contains(token) => {
                return Err(CriteriaError::UnknownInstrument(token.to_string()))
            }
            Some(token) => token.to_string(),
        };

        let genre = match raw.genres.as_deref().map(str::trim) {
            None | Some("") => return Err(CriteriaError::MissingGenre),
            Some(token) if rejected("genres") || !self.vocabulary.genres.contains(token) => {
                return Err(CriteriaError::UnknownGenre(token.to_string()))
            }
            Some(token) => token.to_string(),
        };

        if rejected("zip_code") {
            return Err(CriteriaError::InvalidZip(raw.zip_code.clone()));
        }
        let origin_zip = match raw.zip_code.as_deref().map(str::trim) {
            Some(zip) => ZipCode::parse(zip).map_err(|_| CriteriaError::InvalidZip(Some(zip.to_string())))?,
            None => return Err(CriteriaError::InvalidZip(None)),
        };

        let radius_miles = match raw.radius.as_deref() {
            None => self.default_radius_miles,
            Some(radius) => parse_radius(radius)?,
        };

        Ok(SearchCriteria {
            role,
            instrument,
            genre,
            origin_zip,
            radius_miles,
        })
    }
}

fn parse_role(raw: Option<&str>) -> Result<Role, CriteriaError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Err(CriteriaError::MissingRole),
        Some(raw) => raw,
    };

    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" | "band" | "bands" => Ok(Role::Band),
        "false" | "0" | "off" | "no" | "musician" | "musicians" => Ok(Role::Musician),
        _ => Err(CriteriaError::InvalidRole(raw.to_string())),
    }
}

fn parse_radius(raw: &str) -> Result<u32, CriteriaError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| CriteriaError::InvalidRadius(raw.to_string()))?;

    if value < 0 {
        return Err(CriteriaError::NegativeRadius(value));
    }

    u32::try_from(value).map_err(|_| CriteriaError::InvalidRadius(raw.to_string()))
}
