use std::path::PathBuf;

use thiserror::Error;

/// Input rejected at the Tracking/Query boundary. No state is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or empty
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Day string is not a strict `YYYY-MM-DD` calendar date
    #[error("invalid date format: {0} (expected YYYY-MM-DD)")]
    InvalidFormat(String),

    /// Day lies strictly after today
    #[error("date is in the future: {0}")]
    FutureDate(String),
}

/// usage-meter error types
#[derive(Error, Debug)]
pub enum UsageMeterError {
    /// Failed to parse a stored or submitted document
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stats store operation failed
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Caller input rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Another process already owns the data directory
    #[error("data directory is locked by another process: {}", .0.display())]
    DataDirLocked(PathBuf),
}

/// Result type alias for usage-meter
pub type Result<T> = std::result::Result<T, UsageMeterError>;
