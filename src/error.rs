//! Error types for the leakprobe harness
//!
//! Structured error definitions use thiserror; binaries propagate them
//! through anyhow.

use thiserror::Error;

/// Main error type for harness operations
#[derive(Error, Debug)]
pub enum LeakprobeError {
    /// Pattern identifier outside the catalog
    #[error("Unsupported pattern: {0:?}")]
    UnsupportedPattern(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Positional row access past the end of a result set
    #[error("Index {index} is out of range (result has {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Process memory probe failed
    #[error("Memory probe error: {0}")]
    Probe(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid operation (e.g., zero batch size)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, LeakprobeError>;

/// Convert anyhow::Error to LeakprobeError
impl From<anyhow::Error> for LeakprobeError {
    fn from(err: anyhow::Error) -> Self {
        LeakprobeError::Other(err.to_string())
    }
}
