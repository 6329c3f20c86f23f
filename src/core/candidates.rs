use crate::core::filters::matches_candidate;
use crate::models::{CandidateQuery, SearchCriteria, ZipCodeSet};
use crate::services::directory::{CandidateStream, DirectoryError, UserDirectory};
use futures_util::future;
use futures_util::stream::{StreamExt, TryStreamExt};
use std::fmt;
use thiserror::Error;

/// Which vocabulary table a lookup went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Instrument,
    Genre,
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermKind::Instrument => f.write_str("instrument"),
            TermKind::Genre => f.write_str("genre"),
        }
    }
}

/// Errors raised while producing candidates
#[derive(Debug, Error)]
pub enum SearchError {
    /// The form offered a term that the directory has no row for
    #[error("{kind} {name:?} is offered for search but missing from the directory")]
    ConfigurationFault { kind: TermKind, name: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Finds directory users matching resolved criteria inside a zip code set.
///
/// # Pipeline Stages
/// 1. Resolve the instrument and genre names to directory rows
/// 2. Build a [`CandidateQuery`] over the distinct zip codes
/// 3. Stream the directory's answer, re-checking each user in-process
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    exclude_requester: bool,
}

impl CandidateFilter {
    pub fn new(exclude_requester: bool) -> Self {
        Self { exclude_requester }
    }

    /// Build the query for a search without touching the result rows.
    ///
    /// Fails with [`SearchError::ConfigurationFault`] when either term has
    /// no directory row; that is never reported as "no results".
    pub async fn build_query(
        &self,
        directory: &dyn UserDirectory,
        criteria: &SearchCriteria,
        zip_codes: &ZipCodeSet,
        requester: Option<i64>,
    ) -> Result<CandidateQuery, SearchError> {
        let instrument = directory
            .find_instrument(&criteria.instrument)
            .await?
            .ok_or_else(|| SearchError::ConfigurationFault {
                kind: TermKind::Instrument,
                name: criteria.instrument.clone(),
            })?;

        let genre = directory
            .find_genre(&criteria.genre)
            .await?
            .ok_or_else(|| SearchError::ConfigurationFault {
                kind: TermKind::Genre,
                name: criteria.genre.clone(),
            })?;

        Ok(CandidateQuery {
            zip_codes: zip_codes.to_lookup(),
            role: criteria.role,
            instrument,
            genre,
            exclude_user_id: if self.exclude_requester { requester } else { None },
        })
    }

    /// Stream every candidate for the criteria
    ///
    /// An empty stream means nobody matched. `requester` is only consulted
    /// when requester exclusion is enabled.
    pub async fn find_candidates<'a>(
        &self,
        directory: &'a dyn UserDirectory,
        criteria: &SearchCriteria,
        zip_codes: &ZipCodeSet,
        requester: Option<i64>,
    ) -> Result<CandidateStream<'a>, SearchError> {
        let query = self.build_query(directory, criteria, zip_codes, requester).await?;

        tracing::debug!(
            "Querying directory: role={:?} instrument={} genre={} zip_codes={}",
            query.role,
            query.instrument.name,
            query.genre.name,
            query.zip_codes.len()
        );

        let candidates = directory.candidates(&query);

        Ok(candidates
            .try_filter(move |user| future::ready(matches_candidate(user, &query)))
            .boxed())
    }
}
