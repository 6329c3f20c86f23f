use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Kind of profile being searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Musician,
    Band,
}

impl Role {
    pub fn from_is_band(is_band: bool) -> Self {
        if is_band {
            Role::Band
        } else {
            Role::Musician
        }
    }

    pub fn is_band(self) -> bool {
        matches!(self, Role::Band)
    }

    /// Plural label shown on the search form
    pub fn label(self) -> &'static str {
        match self {
            Role::Musician => "Musicians",
            Role::Band => "Bands",
        }
    }
}

/// Error for anything that is not exactly five ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a five-digit zip code: {0:?}")]
pub struct InvalidZipCode(pub String);

/// Five-digit US zip code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Exactly five ASCII digits; surrounding whitespace is rejected
    pub fn parse(raw: &str) -> Result<Self, InvalidZipCode> {
        if raw.len() == 5 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidZipCode(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ZipCode {
    type Error = InvalidZipCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ZipCode::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

impl Borrow<str> for ZipCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Zip codes inside a radius, in the order the radius service returned them.
///
/// Duplicates are kept as received; use [`ZipCodeSet::distinct`] or
/// [`ZipCodeSet::to_lookup`] when uniqueness matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZipCodeSet(Vec<ZipCode>);

impl ZipCodeSet {
    pub fn new(zip_codes: Vec<ZipCode>) -> Self {
        Self(zip_codes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ZipCode> {
        self.0.iter()
    }

    pub fn contains(&self, zip: &str) -> bool {
        self.0.iter().any(|z| z.as_str() == zip)
    }

    /// First occurrence of each zip code, upstream order preserved
    pub fn distinct(&self) -> Vec<ZipCode> {
        let mut seen = HashSet::with_capacity(self.0.len());
        self.0
            .iter()
            .filter(|zip| seen.insert(zip.as_str()))
            .cloned()
            .collect()
    }

    pub fn to_lookup(&self) -> HashSet<ZipCode> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<ZipCode> for ZipCodeSet {
    fn from_iter<I: IntoIterator<Item = ZipCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Canonical search criteria produced by the criteria resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub role: Role,
    /// Stored vocabulary token, never the display form
    pub instrument: String,
    pub genre: String,
    pub origin_zip: ZipCode,
    pub radius_miles: u32,
}

/// The last successful search of a session, persisted as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSearch {
    pub criteria: SearchCriteria,
    #[serde(rename = "response_zip_codes")]
    pub zip_codes: ZipCodeSet,
    pub searched_at: DateTime<Utc>,
}

/// Directory user, as far as the search pipeline cares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub is_band: bool,
    pub zip_code: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl UserRecord {
    pub fn role(&self) -> Role {
        Role::from_is_band(self.is_band)
    }

    pub fn plays(&self, instrument: &str) -> bool {
        self.instruments.iter().any(|i| i == instrument)
    }

    pub fn plays_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

/// Row of the directory's `instruments` or `genres` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: i64,
    pub name: String,
}

/// Fully resolved query handed to a user directory
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub zip_codes: HashSet<ZipCode>,
    pub role: Role,
    pub instrument: VocabularyEntry,
    pub genre: VocabularyEntry,
    pub exclude_user_id: Option<i64>,
}
