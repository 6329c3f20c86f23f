use crate::models::{CandidateQuery, UserRecord};

/// Check a directory user against every search predicate
///
/// Predicates run cheapest first: zip set lookup, role flag, requester
/// exclusion, then the instrument and genre list scans.
#[inline]
pub fn matches_candidate(user: &UserRecord, query: &CandidateQuery) -> bool {
    if !query.zip_codes.contains(user.zip_code.as_str()) {
        return false;
    }

    if user.role() != query.role {
        return false;
    }

    if query.exclude_user_id == Some(user.id) {
        return false;
    }

    if !user.plays(&query.instrument.name) {
        return false;
    }

    user.plays_genre(&query.genre.name)
}
