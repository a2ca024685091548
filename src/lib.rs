//! Per-day usage metering for characters and groups.
//!
//! Increments are buffered in an in-memory [`services::AggregationCache`],
//! flushed periodically to one JSON file per day, and served back on demand.

pub mod cli;
pub mod config;
pub mod logging;
pub mod services;
pub mod types;

pub use config::Config;
pub use services::UsageMeter;
pub use types::{
    DayBucket, DayKey, EntityCounters, QueryRequest, Result, TrackRequest, UsageMeterError,
    ValidationError,
};
