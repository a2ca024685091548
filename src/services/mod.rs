//! Services for buffering, persisting and serving usage totals

pub mod cache;
pub mod meter;
pub mod query;
pub mod scheduler;
pub mod store;
pub mod tracking;

pub use cache::AggregationCache;
pub use meter::UsageMeter;
pub use scheduler::{flush, FlushOutcome, FlushScheduler};
pub use store::{DataDirLock, DayStore, FileStatsStore};
