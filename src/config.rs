use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub foursquare: FoursquareSettings,
    #[serde(default)]
    pub proximity: ProximitySettings,
    #[serde(default)]
    pub cache: CacheSettings,
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
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoursquareSettings {
    #[serde(default = "default_foursquare_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_foursquare_timeout")]
    pub timeout_secs: u64,
}

impl Default for FoursquareSettings {
    fn default() -> Self {
        Self {
            endpoint: default_foursquare_endpoint(),
            api_key: None,
            timeout_secs: default_foursquare_timeout(),
        }
    }
}

fn default_foursquare_endpoint() -> String { "https://api.foursquare.com/v3".to_string() }
fn default_foursquare_timeout() -> u64 { 5 }

/// Nearby picker tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ProximitySettings {
    /// Distance ceiling in meters when the request does not give one
    #[serde(default = "default_max_distance_m")]
    pub max_distance_m: f64,
    /// Venues requested from the places API per lookup
    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: usize,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            max_distance_m: default_max_distance_m(),
            lookup_limit: default_lookup_limit(),
            lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

fn default_max_distance_m() -> f64 { 1000.0 }
fn default_lookup_limit() -> usize { 50 }
fn default_lookup_timeout() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_venue_ttl")]
    pub venue_ttl_secs: u64,
    #[serde(default = "default_venue_cache_size")]
    pub venue_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            venue_ttl_secs: default_venue_ttl(),
            venue_cache_size: default_venue_cache_size(),
        }
    }
}

fn default_venue_ttl() -> u64 { 300 }
fn default_venue_cache_size() -> u64 { 1000 }

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
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with LIFELOG__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Development overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., LIFELOG__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("LIFELOG")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the well-known variables deployments usually set without the prefix
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("database.url", env::var("DATABASE_URL").ok()),
        ("foursquare.api_key", env::var("FOURSQUARE_API_KEY").ok()),
        ("auth.jwt_secret", env::var("JWT_SECRET").ok()),
        ("logging.level", env::var("LOG_LEVEL").ok()),
        ("logging.format", env::var("LOG_FORMAT").ok()),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (key, value) in overrides {
        if let Some(value) = value {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
