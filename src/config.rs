use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "XMLSHRED_CONFIG";

/// Upper bound for rows per attribute INSERT (3 bound parameters per row,
/// SQLite allows 32766 per statement).
const MAX_ATTRIBUTE_BATCH_ROWS: usize = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Backing store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How long a writer waits for another writer's transaction before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Ingestion tuning
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Maximum attribute rows bound into a single INSERT statement
    #[serde(default = "default_attribute_batch_rows")]
    pub attribute_batch_rows: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            attribute_batch_rows: default_attribute_batch_rows(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("xml_data.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_attribute_batch_rows() -> usize {
    256
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in XMLSHRED_CONFIG environment variable (must exist)
    /// 2. ./config.toml in current directory (built-in defaults when absent)
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let default_path = Path::new("config.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without consulting the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.store.db_path.as_os_str().is_empty() {
            anyhow::bail!("store.db_path must not be empty");
        }

        let rows = self.ingest.attribute_batch_rows;
        if rows == 0 || rows > MAX_ATTRIBUTE_BATCH_ROWS {
            anyhow::bail!(
                "ingest.attribute_batch_rows must be between 1 and {}, got {}",
                MAX_ATTRIBUTE_BATCH_ROWS,
                rows
            );
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.store.db_path
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store.busy_timeout_ms)
    }
}
