//! Run configuration handed to [`Pipeline::new`](crate::Pipeline::new).

use std::path::PathBuf;
use std::time::Duration;

use aipsync_fetch::FetchOptions;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the local archive.
    pub local_root:         PathBuf,
    /// Directory under the root holding this publication's cycles.
    pub country:            String,
    /// Per-unit directory receiving merged artifacts.
    pub merge_dir:          String,
    pub workers:            usize,
    pub queue_capacity:     usize,
    /// Whole-unit retries allowed before the unit is declared failed.
    pub retry_ceiling:      u32,
    pub retry_backoff_ms:   u64,
    /// Accepted size drift between an artifact on disk and its rebuilt
    /// candidate, in bytes, exclusive.
    pub size_tolerance:     u64,
    /// Upper bound for a single fetch; `0` disables the bound.
    pub fetch_timeout_secs: u64,
    pub state_file:         PathBuf,
    pub snapshot_file:      PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_root:         PathBuf::from("aip"),
            country:            "JP".to_string(),
            merge_dir:          "merge".to_string(),
            workers:            5,
            queue_capacity:     10,
            retry_ceiling:      2,
            retry_backoff_ms:   500,
            size_tolerance:     200,
            fetch_timeout_secs: 120,
            state_file:         PathBuf::from("aip/state.json"),
            snapshot_file:      PathBuf::from("info.json"),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SyncError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(SyncError::Config("queue_capacity must be at least 1".into()));
        }
        if self.country.is_empty() || self.merge_dir.is_empty() {
            return Err(SyncError::Config(
                "country and merge_dir must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration { Duration::from_millis(self.retry_backoff_ms) }

    pub fn fetch_options(&self) -> FetchOptions {
        match self.fetch_timeout_secs {
            0 => FetchOptions::default().no_timeout(),
            secs => FetchOptions::default().timeout(Duration::from_secs(secs)),
        }
    }
}
