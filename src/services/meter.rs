//! The usage-meter service object and its start/stop lifecycle

use crate::config::Config;
use crate::services::cache::AggregationCache;
use crate::services::query;
use crate::services::scheduler::{self, FlushOutcome, FlushScheduler};
use crate::services::store::{DataDirLock, FileStatsStore};
use crate::services::tracking;
use crate::types::{DayBucket, DayKey, QueryRequest, Result, TrackRequest, ValidationError};
use std::sync::Arc;

/// Owns the aggregation cache, the flush ticker and the data-directory lock.
/// Created by [`UsageMeter::start`], torn down by [`UsageMeter::stop`].
pub struct UsageMeter {
    cache: Arc<AggregationCache>,
    store: Arc<FileStatsStore>,
    scheduler: FlushScheduler,
    _lock: DataDirLock,
}

impl UsageMeter {
    /// Start hook: prepare the data directory, claim it, begin periodic flushing.
    /// Must be called from within a Tokio runtime.
    pub async fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(FileStatsStore::new(config.data_dir.clone()));
        let lock = store.acquire_owner_lock()?;

        let cache = Arc::new(AggregationCache::new(Box::new(Arc::clone(&store))));
        let scheduler = FlushScheduler::spawn(Arc::clone(&cache), config.flush_interval);

        tracing::info!(data_dir = %config.data_dir.display(), "usage meter started");
        Ok(Self {
            cache,
            store,
            scheduler,
            _lock: lock,
        })
    }

    pub fn track(&self, request: &TrackRequest) -> std::result::Result<(), ValidationError> {
        tracking::track(&self.cache, request)
    }

    pub fn query(&self, request: &QueryRequest) -> std::result::Result<DayBucket, ValidationError> {
        query::query(&self.cache, request)
    }

    /// Day keys that have a file on disk
    pub fn stored_days(&self) -> Vec<DayKey> {
        self.store.list_days()
    }

    pub fn cache(&self) -> &Arc<AggregationCache> {
        &self.cache
    }

    /// Stop hook: halt the ticker, then run exactly one forced flush.
    /// The data-directory lock is released once this returns.
    pub async fn stop(self) -> FlushOutcome {
        self.scheduler.stop().await;

        let cache = Arc::clone(&self.cache);
        let final_pass = tokio::task::spawn_blocking(move || scheduler::flush(&cache, true));
        let outcome = match final_pass.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "final flush panicked");
                FlushOutcome::default()
            }
        };

        if outcome.failed > 0 {
            tracing::error!(failed = outcome.failed, "usage meter stopped with unsaved days");
        } else {
            tracing::info!(written = outcome.written, "usage meter stopped");
        }
        outcome
    }
}
