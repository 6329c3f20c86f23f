// Integration tests for Hook Find

use futures_util::TryStreamExt;
use hook_find::core::CandidateFilter;
use hook_find::models::{Role, SearchCriteria, UserRecord, ZipCode, ZipCodeSet};
use hook_find::services::{GeocodeClient, InMemoryDirectory, MemorySessionStore, SearchSessionCache, SessionId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const INSTRUMENTS: &[&str] = &["acoustic guitar", "bass", "drums", "lead guitar", "vocals"];
const GENRES: &[&str] = &["acoustic", "alt metal", "blues", "country", "dance", "jazz", "metal", "rock"];
const ZIPS: &[&str] = &["11111", "22222", "33333", "44444", "55555", "99999"];

fn create_test_user(
    id: i64,
    name: &str,
    zip: &str,
    is_band: bool,
    instruments: &[&str],
    genres: &[&str],
) -> UserRecord {
    UserRecord {
        id,
        username: name.to_string(),
        is_band,
        zip_code: zip.to_string(),
        city: Some("Test".to_string()),
        state: Some("AL".to_string()),
        bio: None,
        profile_image: None,
        instruments: instruments.iter().map(|s| s.to_string()).collect(),
        genres: genres.iter().map(|s| s.to_string()).collect(),
    }
}

fn create_empty_directory() -> InMemoryDirectory {
    let mut directory = InMemoryDirectory::new();
    for instrument in INSTRUMENTS {
        directory.add_instrument(instrument);
    }
    for genre in GENRES {
        directory.add_genre(genre);
    }
    directory
}

fn create_scenario_directory() -> InMemoryDirectory {
    let mut directory = create_empty_directory();
    directory.insert_user(create_test_user(1, "testband1", "99999", true, &["acoustic guitar", "lead guitar"], &["rock", "dance"]));
    directory.insert_user(create_test_user(2, "testuser1", "11111", false, &["acoustic guitar"], &["rock", "country", "blues"]));
    directory.insert_user(create_test_user(3, "testuser2", "22222", false, &["lead guitar"], &["jazz", "acoustic"]));
    directory.insert_user(create_test_user(4, "testuser3", "33333", false, &["acoustic guitar", "lead guitar", "drums"], &["rock", "metal", "alt metal"]));
    directory
}

/// Deterministic spread of users over zips, roles and attributes
fn create_generated_directory(count: i64) -> InMemoryDirectory {
    let mut directory = create_empty_directory();
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as usize
    };

    for id in 1..=count {
        let zip = ZIPS[next() % ZIPS.len()];
        let is_band = next() % 3 == 0;
        let instruments: Vec<&str> = INSTRUMENTS.iter().copied().filter(|_| next() % 3 == 0).collect();
        let genres: Vec<&str> = GENRES.iter().copied().filter(|_| next() % 3 == 0).collect();
        directory.insert_user(create_test_user(id, &format!("user{}", id), zip, is_band, &instruments, &genres));
    }

    directory
}

fn zip_set(zips: &[&str]) -> ZipCodeSet {
    zips.iter().map(|z| ZipCode::parse(z).unwrap()).collect()
}

fn criteria(role: Role, instrument: &str, genre: &str) -> SearchCriteria {
    SearchCriteria {
        role,
        instrument: instrument.to_string(),
        genre: genre.to_string(),
        origin_zip: ZipCode::parse("11111").unwrap(),
        radius_miles: 10,
    }
}

async fn find(directory: &InMemoryDirectory, criteria: &SearchCriteria, zips: &ZipCodeSet) -> Vec<UserRecord> {
    CandidateFilter::default()
        .find_candidates(directory, criteria, zips, None)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap()
}

fn names(users: &[UserRecord]) -> Vec<&str> {
    users.iter().map(|u| u.username.as_str()).collect()
}

#[tokio::test]
async fn test_integration_musician_search() {
    let directory = create_scenario_directory();
    let zips = zip_set(&["11111", "22222", "33333", "99999"]);

    let found = find(&directory, &criteria(Role::Musician, "acoustic guitar", "rock"), &zips).await;

    assert_eq!(names(&found), vec!["testuser1", "testuser3"]);
}

#[tokio::test]
async fn test_integration_band_search() {
    let directory = create_scenario_directory();
    let zips = zip_set(&["11111", "22222", "33333", "99999"]);

    let found = find(&directory, &criteria(Role::Band, "acoustic guitar", "rock"), &zips).await;

    assert_eq!(names(&found), vec!["testband1"]);
}

#[tokio::test]
async fn test_results_satisfy_every_predicate() {
    let directory = create_generated_directory(300);
    let zips = zip_set(&["11111", "33333", "55555", "33333"]);
    let allowed: HashSet<&str> = ["11111", "33333", "55555"].into_iter().collect();

    for role in [Role::Musician, Role::Band] {
        for instrument in INSTRUMENTS {
            for genre in GENRES {
                let search = criteria(role, instrument, genre);
                let found = find(&directory, &search, &zips).await;

                for user in &found {
                    assert_eq!(user.role(), role, "role partition for {}", user.username);
                    assert!(allowed.contains(user.zip_code.as_str()), "zip containment for {}", user.username);
                    assert!(user.plays(instrument), "{} should play {}", user.username, instrument);
                    assert!(user.plays_genre(genre), "{} should play {}", user.username, genre);
                }

                let expected = directory
                    .users()
                    .iter()
                    .filter(|u| {
                        u.role() == role
                            && allowed.contains(u.zip_code.as_str())
                            && u.plays(instrument)
                            && u.plays_genre(genre)
                    })
                    .count();
                assert_eq!(found.len(), expected, "{:?} / {} / {}", role, instrument, genre);
            }
        }
    }
}

#[tokio::test]
async fn test_repeated_searches_are_deterministic() {
    let directory = create_generated_directory(200);
    let zips = zip_set(ZIPS);
    let search = criteria(Role::Musician, "drums", "rock");

    let first = find(&directory, &search, &zips).await;
    let second = find(&directory, &search, &zips).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cache_round_trip_drives_filter() {
    let directory = create_scenario_directory();
    let cache = SearchSessionCache::new(Arc::new(MemorySessionStore::new(100, 60)));
    let session = SessionId::generate();

    assert!(cache.load(&session).await.unwrap().is_none(), "no search has been stored yet");

    cache
        .store(
            &session,
            criteria(Role::Musician, "acoustic guitar", "rock"),
            zip_set(&["11111", "22222", "33333", "99999"]),
        )
        .await
        .unwrap();

    let cached = cache.load(&session).await.unwrap().expect("cached search");
    let found = find(&directory, &cached.criteria, &cached.zip_codes).await;

    assert_eq!(names(&found), vec!["testuser1", "testuser3"]);
}

#[tokio::test]
async fn test_failed_lookup_leaves_cache_untouched() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/key/radius.json/11111/10/miles")
        .with_status(200)
        .with_body(r#"{"zip_codes":[{"zip_code":"11111"},{"zip_code":"33333"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/key/radius.json/22222/10/miles")
        .with_status(200)
        .with_body(r#"{"error_code":429,"error_msg":"Usage limit exceeded."}"#)
        .create_async()
        .await;

    let geocode = GeocodeClient::new(&server.url(), "key", "radius.json", Duration::from_secs(2)).unwrap();
    let cache = SearchSessionCache::new(Arc::new(MemorySessionStore::new(100, 60)));
    let session = SessionId::generate();

    let first = criteria(Role::Musician, "drums", "rock");
    let zips = geocode.resolve_radius(&first.origin_zip, first.radius_miles).await.unwrap();
    let stored = cache.store(&session, first, zips).await.unwrap();

    let mut second = criteria(Role::Band, "bass", "jazz");
    second.origin_zip = ZipCode::parse("22222").unwrap();
    let result = geocode.resolve_radius(&second.origin_zip, second.radius_miles).await;
    assert!(result.is_err());

    assert_eq!(cache.load(&session).await.unwrap(), Some(stored));
}
