//! quorum/crates/configs/src/lib.rs
//!
//! Typed settings for every deployable piece of Quorum, loaded from an
//! optional TOML file and overridden by `QUORUM__`-prefixed environment
//! variables (`QUORUM__SEARCH__BASE_URL`, `QUORUM__CACHE__TTL_SECS`, ...).
//! Credentials are wrapped in `secrecy` so they never land in logs.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub redis: RedisSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub comments: CommentSettings,

    #[serde(default)]
    pub retention: RetentionSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    /// File (optional, `QUORUM_CONFIG` path or `quorum.toml`) first,
    /// environment second. Environment always wins.
    pub fn load() -> Result<Self, config::ConfigError> {
        // Best effort: a missing .env file is the normal case.
        dotenvy::dotenv().ok();

        let config_path =
            std::env::var("QUORUM_CONFIG").unwrap_or_else(|_| "quorum.toml".to_string());

        config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("QUORUM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres connection string. Unset means the in-memory store.
    pub url: Option<SecretString>,

    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection string. Unset means the in-memory tag cache.
    pub url: Option<SecretString>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

/// The external indexed search service. Disabled (or unset) means every
/// search goes straight to the local fallback matcher.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub enabled: bool,

    pub base_url: Option<String>,

    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,

    pub api_key: Option<SecretString>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            timeout_ms: default_search_timeout_ms(),
            api_key: None,
        }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentSettings {
    #[serde(default = "default_max_comment_len")]
    pub max_body_len: usize,
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            max_body_len: default_max_comment_len(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    /// Grace period before soft-deleted content is purged for good.
    #[serde(default = "default_purge_grace_days")]
    pub purge_grace_days: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            purge_grace_days: default_purge_grace_days(),
        }
    }
}

impl RetentionSettings {
    pub fn purge_grace(&self) -> Duration {
        Duration::from_secs(self.purge_grace_days * 24 * 60 * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// configured level.
pub fn init_tracing(settings: &ObservabilitySettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.log_level.clone()));

    if settings.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_key_prefix() -> String {
    "quorum".to_string()
}

fn default_search_timeout_ms() -> u64 {
    2_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_comment_len() -> usize {
    1_000
}

fn default_purge_grace_days() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}
