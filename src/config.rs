//! Runtime configuration

use crate::types::{Result, UsageMeterError};
use std::path::PathBuf;
use std::time::Duration;

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data/usage-stats";

pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>, flush_interval: Duration) -> Self {
        Self {
            data_dir: data_dir.into(),
            flush_interval,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(UsageMeterError::Config(
                "flush interval must be greater than zero".into(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(UsageMeterError::Config("data directory must not be empty".into()));
        }
        Ok(())
    }
}
