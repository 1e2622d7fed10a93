//! Error types for the blocked evaluation tracker.
//!
//! Tracker operations never fail; these errors only surface while
//! loading configuration.

use thiserror::Error;

/// Result type alias for fallible tracker setup.
pub type BlockedResult<T> = Result<T, BlockedError>;

/// Errors that can occur while configuring the tracker.
#[derive(Debug, Error)]
pub enum BlockedError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
