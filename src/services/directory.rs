use crate::config::DatabaseSettings;
use crate::core::filters::matches_candidate;
use crate::core::vocabulary::Vocabulary;
use crate::models::{CandidateQuery, UserRecord, VocabularyEntry};
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when reading the user directory
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

/// Lazily produced candidates; nothing is buffered before the first item
pub type CandidateStream<'a> = BoxStream<'a, Result<UserRecord, DirectoryError>>;

/// Read access to the user directory used by the search pipeline
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an instrument row by its stored name
    async fn find_instrument(&self, name: &str) -> Result<Option<VocabularyEntry>, DirectoryError>;

    /// Look up a genre row by its stored name
    async fn find_genre(&self, name: &str) -> Result<Option<VocabularyEntry>, DirectoryError>;

    /// Stream every user admitted by the query
    fn candidates<'a>(&'a self, query: &CandidateQuery) -> CandidateStream<'a>;

    async fn health_check(&self) -> bool {
        true
    }
}

const FIND_INSTRUMENT_SQL: &str = r#"
    SELECT id, name
    FROM instruments
    WHERE name = $1
    ORDER BY id
    LIMIT 1
"#;

const FIND_GENRE_SQL: &str = r#"
    SELECT id, name
    FROM genres
    WHERE name = $1
    ORDER BY id
    LIMIT 1
"#;

// Zip and role first so the planner can use idx_users_zip_role before
// probing the join tables.
const CANDIDATES_SQL: &str = r#"
    SELECT
        u.id,
        u.username,
        u.is_band,
        u.zip_code,
        u.city,
        u.state,
        u.bio,
        u.profile_image,
        ARRAY(
            SELECT i.name
            FROM users_instruments ui
            JOIN instruments i ON i.id = ui.instrument_id
            WHERE ui.user_id = u.id
            ORDER BY i.name
        ) AS instruments,
        ARRAY(
            SELECT g.name
            FROM users_genres ug
            JOIN genres g ON g.id = ug.genre_id
            WHERE ug.user_id = u.id
            ORDER BY g.name
        ) AS genres
    FROM users u
    WHERE u.zip_code = ANY($1)
      AND u.is_band = $2
      AND ($5::BIGINT IS NULL OR u.id <> $5)
      AND EXISTS (
          SELECT 1 FROM users_instruments ui
          WHERE ui.user_id = u.id AND ui.instrument_id = $3
      )
      AND EXISTS (
          SELECT 1 FROM users_genres ug
          WHERE ug.user_id = u.id AND ug.genre_id = $4
      )
    ORDER BY u.id
"#;

const SYNC_INSTRUMENTS_SQL: &str = r#"
    INSERT INTO instruments (name)
    SELECT UNNEST($1::TEXT[])
    ON CONFLICT (name) DO NOTHING
"#;

const SYNC_GENRES_SQL: &str = r#"
    INSERT INTO genres (name)
    SELECT UNNEST($1::TEXT[])
    ON CONFLICT (name) DO NOTHING
"#;

#[derive(Debug, sqlx::FromRow)]
struct VocabularyRow {
    id: i64,
    name: String,
}

impl From<VocabularyRow> for VocabularyEntry {
    fn from(row: VocabularyRow) -> Self {
        Self { id: row.id, name: row.name }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    is_band: bool,
    zip_code: Option<String>,
    city: Option<String>,
    state: Option<String>,
    bio: Option<String>,
    profile_image: Option<String>,
    instruments: Vec<String>,
    genres: Vec<String>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            is_band: row.is_band,
            zip_code: row.zip_code.unwrap_or_default(),
            city: row.city,
            state: row.state,
            bio: row.bio,
            profile_image: row.profile_image,
            instruments: row.instruments,
            genres: row.genres,
        }
    }
}

/// PostgreSQL-backed user directory
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    /// Connect and run the embedded migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Make sure every vocabulary token has a directory row
    ///
    /// Existing rows keep their ids. Returns how many instruments and
    /// genres were newly inserted.
    pub async fn sync_vocabulary(&self, vocabulary: &Vocabulary) -> Result<(u64, u64), DirectoryError> {
        let instruments: Vec<String> = vocabulary.instruments.terms().iter().map(|t| t.token.clone()).collect();
        let genres: Vec<String> = vocabulary.genres.terms().iter().map(|t| t.token.clone()).collect();

        let mut tx = self.pool.begin().await?;
        let added_instruments = sqlx::query(SYNC_INSTRUMENTS_SQL)
            .bind(&instruments)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let added_genres = sqlx::query(SYNC_GENRES_SQL)
            .bind(&genres)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::info!(
            "Vocabulary synced to directory ({} instruments and {} genres added)",
            added_instruments,
            added_genres
        );
        Ok((added_instruments, added_genres))
    }

    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, DirectoryError> {
        tracing::info!(
            "Connecting to PostgreSQL directory (max: {} connections)",
            settings.max_connections.unwrap_or(10)
        );

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    async fn find_instrument(&self, name: &str) -> Result<Option<VocabularyEntry>, DirectoryError> {
        let row = sqlx::query_as::<_, VocabularyRow>(FIND_INSTRUMENT_SQL)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(VocabularyEntry::from))
    }

    async fn find_genre(&self, name: &str) -> Result<Option<VocabularyEntry>, DirectoryError> {
        let row = sqlx::query_as::<_, VocabularyRow>(FIND_GENRE_SQL)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(VocabularyEntry::from))
    }

    fn candidates<'a>(&'a self, query: &CandidateQuery) -> CandidateStream<'a> {
        let zip_codes: Vec<String> = query.zip_codes.iter().map(|z| z.as_str().to_string()).collect();

        sqlx::query_as::<_, UserRow>(CANDIDATES_SQL)
            .bind(zip_codes)
            .bind(query.role.is_band())
            .bind(query.instrument.id)
            .bind(query.genre.id)
            .bind(query.exclude_user_id)
            .fetch(&self.pool)
            .map(|row| row.map(UserRecord::from).map_err(DirectoryError::from))
            .boxed()
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

/// Directory held entirely in memory
///
/// Used for local development and tests; applies the same predicate as
/// the candidate filter while iterating.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    instruments: Vec<VocabularyEntry>,
    genres: Vec<VocabularyEntry>,
    users: Vec<UserRecord>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the instrument and genre tables from a vocabulary
    pub fn with_vocabulary(vocabulary: &Vocabulary) -> Self {
        let mut directory = Self::new();
        for term in vocabulary.instruments.terms() {
            directory.add_instrument(&term.token);
        }
        for term in vocabulary.genres.terms() {
            directory.add_genre(&term.token);
        }
        directory
    }

    pub fn add_instrument(&mut self, name: &str) -> VocabularyEntry {
        let entry = VocabularyEntry {
            id: self.instruments.len() as i64 + 1,
            name: name.to_string(),
        };
        self.instruments.push(entry.clone());
        entry
    }

    pub fn add_genre(&mut self, name: &str) -> VocabularyEntry {
        let entry = VocabularyEntry {
            id: self.genres.len() as i64 + 1,
            name: name.to_string(),
        };
        self.genres.push(entry.clone());
        entry
    }

    pub fn insert_user(&mut self, user: UserRecord) {
        self.users.push(user);
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_instrument(&self, name: &str) -> Result<Option<VocabularyEntry>, DirectoryError> {
        Ok(self.instruments.iter().find(|e| e.name == name).cloned())
    }

    async fn find_genre(&self, name: &str) -> Result<Option<VocabularyEntry>, DirectoryError> {
        Ok(self.genres.iter().find(|e| e.name == name).cloned())
    }

    fn candidates<'a>(&'a self, query: &CandidateQuery) -> CandidateStream<'a> {
        let query = query.clone();
        let matching = self
            .users
            .iter()
            .filter(move |user| matches_candidate(user, &query))
            .cloned()
            .map(Ok);

        stream::iter(matching).boxed()
    }
}
