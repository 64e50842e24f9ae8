use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;

const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_CACHE_CAPACITY: usize = 1000;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_SEARCH_TTL_SECS: u64 = 120;
const DEFAULT_TXN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Cache tuning. `capacity` bounds the in-process fallback store;
/// `default_ttl_secs` applies when callers do not pass an explicit TTL.
#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
    /// TTL for search/listing pages; bounds staleness for any key that
    /// survives a version bump.
    #[serde(default = "default_search_ttl")]
    pub search_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            capacity: default_cache_capacity(),
            default_ttl_secs: default_cache_ttl(),
            search_ttl_secs: default_search_ttl(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Whether to run database migrations on startup.
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Upper bound on an order-creation transaction before it fails fast
    /// with a retryable error.
    #[serde(default = "default_txn_timeout_secs")]
    pub txn_timeout_secs: u64,

    /// Recipients for high-severity alert notifications.
    #[serde(default)]
    pub alert_recipients: Vec<String>,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_search_ttl() -> u64 {
    DEFAULT_SEARCH_TTL_SECS
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_acquire_timeout_secs() -> u64 {
    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS
}
fn default_txn_timeout_secs() -> u64 {
    DEFAULT_TXN_TIMEOUT_SECS
}

impl AppConfig {
    /// Minimal constructor used by tests and embedding binaries.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            cache: CacheConfig::default(),
            environment: DEFAULT_ENV.to_string(),
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            txn_timeout_secs: default_txn_timeout_secs(),
            alert_recipients: Vec::new(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Loads configuration from `config/{default,<env>}.toml` (when present)
/// with `APP_`-prefixed environment variables taking precedence.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(environment = %run_env, "Loading configuration");

    let mut builder = Config::builder();

    let default_path = Path::new(CONFIG_DIR).join("default.toml");
    if default_path.exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(format!("{}.toml", run_env));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path));
    }

    builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("environment", run_env)?
        .build()?
        .try_deserialize()
}
