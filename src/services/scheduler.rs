//! Periodic persistence of dirty days

use crate::services::cache::AggregationCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a single flush pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushOutcome {
    pub written: usize,
    pub failed: usize,
    /// Periodic pass skipped because another flush was in progress
    pub skipped: bool,
}

/// Persist every dirty day.
///
/// A periodic pass (`force == false`) gives up immediately if another flush
/// holds the flush lock; a forced pass waits for it. Failed saves leave the
/// day dirty for the next pass.
pub fn flush(cache: &AggregationCache, force: bool) -> FlushOutcome {
    let _guard = if force {
        cache.flush_lock().lock()
    } else {
        match cache.flush_lock().try_lock() {
            Some(guard) => guard,
            None => {
                return FlushOutcome {
                    skipped: true,
                    ..Default::default()
                }
            }
        }
    };

    let snapshots = cache.take_dirty_snapshots();
    if snapshots.is_empty() {
        return FlushOutcome::default();
    }

    let mut outcome = FlushOutcome::default();
    for (key, bucket) in snapshots {
        match cache.store().save(key, &bucket) {
            Ok(()) => outcome.written += 1,
            Err(e) => {
                tracing::error!(day = %key, error = %e, "failed to persist usage stats");
                cache.mark_dirty(key);
                outcome.failed += 1;
            }
        }
    }

    if force {
        tracing::info!(
            written = outcome.written,
            failed = outcome.failed,
            "forced flush complete"
        );
    } else {
        tracing::debug!(
            written = outcome.written,
            failed = outcome.failed,
            "periodic flush complete"
        );
    }
    outcome
}

/// Repeating flush task owned by the service
pub struct FlushScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    /// Spawn the ticker on the current Tokio runtime. The first flush runs one
    /// full `period` after start.
    pub fn spawn(cache: Arc<AggregationCache>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Consume the immediate first tick.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !cache.has_dirty() {
                            continue;
                        }
                        let cache = Arc::clone(&cache);
                        let pass = tokio::task::spawn_blocking(move || flush(&cache, false));
                        if let Err(e) = pass.await {
                            tracing::error!(error = %e, "flush task panicked");
                        }
                    }
                }
            }
            tracing::debug!("flush ticker stopped");
        });

        tracing::info!(period = ?period, "flush scheduler started");
        Self { cancel, handle }
    }

    /// Stop ticking and wait for an in-flight periodic flush to finish.
    /// The final forced flush is the caller's job.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "flush ticker ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::test_support::memory_cache;
    use crate::types::{DayKey, IncrementDelta};
    use std::sync::atomic::Ordering;

    fn day(s: &str) -> DayKey {
        DayKey::parse(s).unwrap()
    }

    fn words(n: u64) -> IncrementDelta {
        IncrementDelta {
            user_words: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_flush_empty_cache_is_noop() {
        let (cache, store) = memory_cache();

        let outcome = flush(&cache, true);

        assert_eq!(outcome, FlushOutcome::default());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert!(store.days.lock().is_empty());
    }

    #[test]
    fn test_flush_writes_every_dirty_day() {
        let (cache, store) = memory_cache();
        cache.apply_increment(day("2024-01-09"), "char1", &words(3));
        cache.apply_increment(day("2024-01-10"), "char1", &words(4));

        let outcome = flush(&cache, false);

        assert_eq!(outcome.written, 2);
        assert!(!cache.has_dirty());
        let days = store.days.lock();
        assert_eq!(days[&day("2024-01-09")].get("char1").unwrap().user_word_count, 3);
        assert_eq!(days[&day("2024-01-10")].get("char1").unwrap().user_word_count, 4);
    }

    #[test]
    fn test_flush_skips_clean_days() {
        let (cache, store) = memory_cache();
        cache.get_or_load(day("2024-01-08"));
        cache.apply_increment(day("2024-01-10"), "char1", &words(1));

        flush(&cache, false);

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert!(!store.days.lock().contains_key(&day("2024-01-08")));
    }

    #[test]
    fn test_second_flush_without_changes_writes_nothing() {
        let (cache, store) = memory_cache();
        cache.apply_increment(day("2024-01-10"), "char1", &words(1));

        flush(&cache, false);
        let outcome = flush(&cache, false);

        assert_eq!(outcome.written, 0);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_save_stays_dirty_and_retries() {
        let (cache, store) = memory_cache();
        cache.apply_increment(day("2024-01-10"), "char1", &words(5));
        store.fail_saves.store(true, Ordering::SeqCst);

        let outcome = flush(&cache, false);
        assert_eq!(outcome.failed, 1);
        assert_eq!(cache.dirty_days(), vec![day("2024-01-10")]);

        store.fail_saves.store(false, Ordering::SeqCst);
        let outcome = flush(&cache, false);
        assert_eq!(outcome.written, 1);
        assert!(!cache.has_dirty());
        assert_eq!(
            store.days.lock()[&day("2024-01-10")]
                .get("char1")
                .unwrap()
                .user_word_count,
            5
        );
    }

    #[test]
    fn test_periodic_flush_skips_while_another_runs() {
        let (cache, _store) = memory_cache();
        cache.apply_increment(day("2024-01-10"), "char1", &words(1));

        let _held = cache.flush_lock().lock();
        let outcome = flush(&cache, false);

        assert!(outcome.skipped);
        assert!(cache.has_dirty());
    }

    #[test]
    fn test_forced_flush_waits_for_running_flush_then_writes() {
        let (cache, store) = memory_cache();
        cache.apply_increment(day("2024-01-10"), "char1", &words(3));

        let held = cache.flush_lock().lock();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::scope(|scope| {
            let cache = &cache;
            let forced = scope.spawn(move || {
                let outcome = flush(cache, true);
                done_tx.send(()).unwrap();
                outcome
            });

            assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
            assert_eq!(store.saves.load(Ordering::SeqCst), 0);
            assert!(cache.has_dirty());

            drop(held);
            let outcome = forced.join().unwrap();
            assert!(!outcome.skipped);
            assert_eq!(outcome.written, 1);
        });

        assert!(!cache.has_dirty());
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scheduler_flushes_on_tick() {
        let (cache, store) = memory_cache();
        let cache = Arc::new(cache);
        cache.apply_increment(day("2024-01-10"), "char1", &words(2));

        let scheduler = FlushScheduler::spawn(Arc::clone(&cache), Duration::from_millis(20));
        for _ in 0..100 {
            if !cache.has_dirty() && store.saves.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.stop().await;

        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert!(!cache.has_dirty());
    }

    #[tokio::test]
    async fn test_scheduler_stop_does_not_flush() {
        let (cache, store) = memory_cache();
        let cache = Arc::new(cache);
        cache.apply_increment(day("2024-01-10"), "char1", &words(2));

        let scheduler = FlushScheduler::spawn(Arc::clone(&cache), Duration::from_secs(3600));
        scheduler.stop().await;

        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
        assert!(cache.has_dirty());
    }
}
