//! Configuration management for taxondb.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `taxondb.toml` file
//! 3. User config `~/.config/taxondb/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

use crate::models::Levels;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database location.
    pub database: DatabaseConfig,

    /// Lineage query configuration.
    pub query: QueryConfig,

    /// Taxdump ingestion configuration.
    pub ingest: IngestConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./taxondb.toml` (project local)
    /// 2. `~/.config/taxondb/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(DEFAULT_CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Malformed numeric or strategy values are rejected rather than ignored,
    /// since they usually point at a typo in a deployment script.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = std::env::var("TAXONDB_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(key) = std::env::var("TAXONDB_S3_KEY") {
            self.database.s3_key = Some(key);
        }
        if let Ok(bucket) = std::env::var("TAXONDB_S3_BUCKET") {
            self.database.s3_bucket = Some(bucket);
        }

        if let Ok(levels) = std::env::var("TAXONDB_LEVELS") {
            self.query.levels = levels.parse().map_err(|_| {
                ConfigError::Invalid(format!("TAXONDB_LEVELS: {}", levels))
            })?;
        }
        if let Ok(strategy) = std::env::var("TAXONDB_STRATEGY") {
            self.query.strategy = strategy.parse()?;
        }

        if let Ok(url) = std::env::var("TAXONDB_ARCHIVE_URL") {
            self.ingest.archive_url = url;
        }
        if let Ok(retries) = std::env::var("TAXONDB_FETCH_RETRIES") {
            self.ingest.fetch_retries = retries.parse().map_err(|_| {
                ConfigError::Invalid(format!("TAXONDB_FETCH_RETRIES: {}", retries))
            })?;
        }
        if let Ok(timeout) = std::env::var("TAXONDB_FETCH_TIMEOUT_SECS") {
            self.ingest.fetch_timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::Invalid(format!("TAXONDB_FETCH_TIMEOUT_SECS: {}", timeout))
            })?;
        }

        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,

    /// Object key of a database kept in S3. When set, `path` is ignored and
    /// the file is worked on through a temporary local copy.
    pub s3_key: Option<String>,

    /// Bucket holding `s3_key`; falls back to `AWS_STORAGE_BUCKET_NAME`.
    pub s3_bucket: Option<String>,
}

impl DatabaseConfig {
    pub fn is_remote(&self) -> bool {
        self.s3_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            s3_key: None,
            s3_bucket: None,
        }
    }
}

/// How ancestor walks read parent links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// Walk an in-memory tree index snapshot.
    #[default]
    Index,
    /// Issue one store lookup per step; no index is built.
    Direct,
}

impl FromStr for LookupMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "index" | "indexed" => Ok(LookupMode::Index),
            "direct" => Ok(LookupMode::Direct),
            other => Err(ConfigError::Invalid(format!("unknown lookup mode: {}", other))),
        }
    }
}

/// Lineage query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Levels of interest, general to specific.
    pub levels: Levels,

    /// Ancestor walk strategy.
    pub strategy: LookupMode,

    /// Upper bound on parent hops per walk; 0 only resolves the root itself.
    pub max_depth: usize,

    /// Fan batch classification out over worker threads.
    pub parallel: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            levels: Levels::default(),
            strategy: LookupMode::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            parallel: false,
        }
    }
}

/// Taxdump ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Archive location: an http(s) URL, a `file://` URL or a local path.
    pub archive_url: String,

    /// Node records member inside the archive.
    pub nodes_file: String,

    /// Name records member inside the archive.
    pub names_file: String,

    /// Name class kept during ingestion.
    pub name_class: String,

    /// Download connect timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Retries after the first failed download.
    pub fetch_retries: u32,

    /// Pause between download attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Rows per insert transaction.
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            nodes_file: DEFAULT_NODES_FILE.to_string(),
            names_file: DEFAULT_NAMES_FILE.to_string(),
            name_class: DEFAULT_NAME_CLASS.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_retries: DEFAULT_FETCH_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl IngestConfig {
    /// Download timeout as a `Duration`.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Delay between download attempts as a `Duration`.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
