use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub geocode: GeocodeSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub vocabulary: VocabularySettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeSettings {
    #[serde(default = "default_geocode_base_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_geocode_format")]
    pub format: String,
    #[serde(default = "default_geocode_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_geocode_base_url() -> String { "https://www.zipcodeapi.com/rest".to_string() }
fn default_geocode_format() -> String { "radius.json".to_string() }
fn default_geocode_timeout_secs() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_session_backend")]
    pub backend: SessionBackend,
    pub redis_url: Option<String>,
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_session_capacity")]
    pub capacity: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            redis_url: None,
            ttl_secs: default_session_ttl_secs(),
            capacity: default_session_capacity(),
            cookie_name: default_cookie_name(),
            secure_cookie: false,
        }
    }
}

fn default_session_backend() -> SessionBackend { SessionBackend::Memory }
fn default_session_ttl_secs() -> u64 { 86_400 }
fn default_session_capacity() -> u64 { 100_000 }
fn default_cookie_name() -> String { "hook_session".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct VocabularySettings {
    #[serde(default = "default_instruments_path")]
    pub instruments_path: String,
    #[serde(default = "default_genres_path")]
    pub genres_path: String,
}

impl Default for VocabularySettings {
    fn default() -> Self {
        Self {
            instruments_path: default_instruments_path(),
            genres_path: default_genres_path(),
        }
    }
}

fn default_instruments_path() -> String { "data/instruments.txt".to_string() }
fn default_genres_path() -> String { "data/genres.txt".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_radius_miles")]
    pub default_radius_miles: u32,
    /// Upper bound of the form's radius slider; not enforced on submissions
    #[serde(default = "default_max_radius_miles")]
    pub max_radius_miles: u32,
    #[serde(default)]
    pub exclude_requester: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_radius_miles: default_radius_miles(),
            max_radius_miles: default_max_radius_miles(),
            exclude_requester: false,
        }
    }
}

fn default_radius_miles() -> u32 { crate::core::DEFAULT_RADIUS_MILES }
fn default_max_radius_miles() -> u32 { 100 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with HOOK__)
    /// 5. `ZIPCODE_API_KEY` and `DATABASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., HOOK__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("HOOK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("HOOK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

/// Apply the conventional secret variables on top of the layered config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = env::var("ZIPCODE_API_KEY") {
        builder = builder.set_override("geocode.api_key", api_key)?;
    }
    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }

    builder.build()
}
