//! Per-day stats files
//!
//! One pretty-printed JSON document per day key in `<data_dir>/<YYYY-MM-DD>.json`.
//! Reads never fail: a missing file is an empty day, an unreadable or corrupt
//! one is logged and treated as empty. Writes go through a temp file and an
//! atomic rename so a crash never leaves a half-written day behind.

use crate::types::{DayBucket, DayKey, Result, UsageMeterError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE_NAME: &str = ".lock";

/// Durable storage for day buckets
pub trait DayStore: Send + Sync {
    /// Load a day. Absent or unreadable data yields an empty bucket.
    fn load(&self, key: DayKey) -> DayBucket;

    /// Persist a day, replacing whatever was stored before
    fn save(&self, key: DayKey, bucket: &DayBucket) -> Result<()>;
}

impl<S: DayStore + ?Sized> DayStore for Arc<S> {
    fn load(&self, key: DayKey) -> DayBucket {
        (**self).load(key)
    }

    fn save(&self, key: DayKey, bucket: &DayBucket) -> Result<()> {
        (**self).save(key, bucket)
    }
}

pub struct FileStatsStore {
    data_dir: PathBuf,
    /// Move unparseable files aside on load. Off for readers that do not own the directory.
    quarantine_corrupt: bool,
}

impl FileStatsStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            quarantine_corrupt: true,
        }
    }

    /// Store that never modifies the directory on load. Corrupt files are
    /// still read as empty days but stay where they are.
    pub fn read_only(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            quarantine_corrupt: false,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn day_path(&self, key: DayKey) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    /// Create the data directory. Safe to call any number of times.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Take the exclusive owner lock on the data directory.
    /// Fails with `DataDirLocked` if another process holds it.
    pub fn acquire_owner_lock(&self) -> Result<DataDirLock> {
        self.ensure_dir()?;
        let path = self.data_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| UsageMeterError::DataDirLocked(self.data_dir.clone()))?;

        Ok(DataDirLock { file, path })
    }

    /// All day keys with a stored file, ascending
    pub fn list_days(&self) -> Vec<DayKey> {
        let pattern = self.data_dir.join("*.json");
        let pattern_str = pattern.to_string_lossy();

        let mut days: Vec<DayKey> = glob::glob(&pattern_str)
            .map(|paths| {
                paths
                    .filter_map(|entry| entry.ok())
                    .filter(|path| path.is_file())
                    .filter_map(|path| {
                        path.file_stem()
                            .and_then(|stem| stem.to_str())
                            .and_then(|stem| DayKey::parse(stem).ok())
                    })
                    .collect()
            })
            .unwrap_or_default();
        days.sort();
        days
    }

    /// Move an unparseable file out of the way so the next save cannot clobber it
    fn quarantine(&self, path: &Path) {
        let aside = path.with_extension("json.corrupt");
        match fs::rename(path, &aside) {
            Ok(()) => {
                tracing::warn!(file = %aside.display(), "moved corrupt stats file aside");
            }
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "failed to move corrupt stats file aside"
                );
            }
        }
    }
}

impl DayStore for FileStatsStore {
    fn load(&self, key: DayKey) -> DayBucket {
        let path = self.day_path(key);
        if !path.exists() {
            return DayBucket::new();
        }

        // Raw bytes so that bad encoding is treated as corruption, not as a read error.
        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(day = %key, error = %e, "failed to read stats file");
                return DayBucket::new();
            }
        };

        match serde_json::from_slice(&content) {
            Ok(bucket) => bucket,
            Err(e) => {
                tracing::warn!(day = %key, error = %e, "corrupted stats file");
                if self.quarantine_corrupt {
                    self.quarantine(&path);
                }
                DayBucket::new()
            }
        }
    }

    fn save(&self, key: DayKey, bucket: &DayBucket) -> Result<()> {
        self.ensure_dir()?;

        let content = serde_json::to_string_pretty(bucket)
            .map_err(|e| UsageMeterError::Store(format!("Serialization failed: {}", e)))?;

        let path = self.day_path(key);
        let temp_path = path.with_extension("json.tmp");

        {
            let mut file = File::create(&temp_path)
                .map_err(|e| UsageMeterError::Store(format!("Failed to create temp file: {}", e)))?;
            file.write_all(content.as_bytes())
                .map_err(|e| UsageMeterError::Store(format!("Failed to write temp file: {}", e)))?;
            file.sync_all()
                .map_err(|e| UsageMeterError::Store(format!("Failed to sync temp file: {}", e)))?;
        }

        fs::rename(&temp_path, &path)
            .map_err(|e| UsageMeterError::Store(format!("Failed to rename temp file: {}", e)))?;

        Ok(())
    }
}

/// Held for as long as this process owns the data directory
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
