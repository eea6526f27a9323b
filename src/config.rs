//! Harness configuration
//!
//! TOML format, every key optional:
//!
//! ```toml
//! [database]
//! path = "leakprobe.db"
//! table = "test_pg_mem_leak"
//!
//! [sampler]
//! num_exec = 10
//! interval_secs = 5
//! row_limit = 50000
//!
//! [provisioner]
//! total_records = 50000
//! records_per_batch = 100
//! ```
//!
//! `LEAKPROBE_DB_PATH` and `LEAKPROBE_TABLE` override the `[database]`
//! section after the file is read.

use crate::error::{LeakprobeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "LEAKPROBE_DB_PATH";

/// Environment variable overriding the table name
pub const TABLE_ENV: &str = "LEAKPROBE_TABLE";

/// Complete harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sampler: SamplerSettings,

    #[serde(default)]
    pub provisioner: ProvisionerSettings,
}

/// Connection settings shared by both binaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Table holding the large rows
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            table: default_table(),
        }
    }
}

/// Sampler loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Iterations that run the pattern before the loop goes idle
    #[serde(default = "default_num_exec")]
    pub num_exec: u64,

    /// Sleep between iterations
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// LIMIT applied to the select
    #[serde(default = "default_row_limit")]
    pub row_limit: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            num_exec: default_num_exec(),
            interval_secs: default_interval_secs(),
            row_limit: default_row_limit(),
        }
    }
}

impl SamplerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Provisioner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerSettings {
    #[serde(default = "default_total_records")]
    pub total_records: usize,

    #[serde(default = "default_records_per_batch")]
    pub records_per_batch: usize,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            total_records: default_total_records(),
            records_per_batch: default_records_per_batch(),
        }
    }
}

// Default value helpers
fn default_db_path() -> PathBuf {
    PathBuf::from("leakprobe.db")
}

fn default_table() -> String {
    "test_pg_mem_leak".to_string()
}

fn default_num_exec() -> u64 {
    10
}

fn default_interval_secs() -> u64 {
    5
}

fn default_row_limit() -> u64 {
    50_000
}

fn default_total_records() -> usize {
    50_000
}

fn default_records_per_batch() -> usize {
    100
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults: {:?}", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            LeakprobeError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file: {}", e),
            ))
        })?;

        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(content)
            .map_err(|e| LeakprobeError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LEAKPROBE_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(DB_PATH_ENV).ok().filter(|v| !v.is_empty()),
            std::env::var(TABLE_ENV).ok().filter(|v| !v.is_empty()),
        )
    }

    /// Apply explicit overrides (CLI flags, environment)
    pub fn with_overrides(mut self, db_path: Option<String>, table: Option<String>) -> Result<Self> {
        if let Some(path) = db_path {
            self.database.path = PathBuf::from(path);
        }
        if let Some(table) = table {
            self.database.table = table;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.database.table)?;
        if self.provisioner.records_per_batch == 0 {
            return Err(LeakprobeError::Config(
                "provisioner.records_per_batch must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Table names are spliced into SQL text, so only plain identifiers pass
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(LeakprobeError::Config(format!(
            "Invalid table name: {:?}",
            name
        )))
    }
}
