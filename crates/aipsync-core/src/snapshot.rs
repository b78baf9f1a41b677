//! JSON snapshot of a processed cycle, written after each successful run.

use std::path::Path;

use aipsync_fs::{AtomicWriteOptions, atomic_read, atomic_write};

use crate::error::{Result, SyncError};
use crate::model::PublicationCycle;

pub fn write_snapshot(cycle: &PublicationCycle, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let snapshot_err = |reason: String| SyncError::Snapshot {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        aipsync_fs::ensure_dir(parent).map_err(|e| snapshot_err(e.to_string()))?;
    }
    let json = serde_json::to_vec_pretty(cycle).map_err(|e| snapshot_err(e.to_string()))?;
    atomic_write(path, &json, AtomicWriteOptions::default()).map_err(|e| snapshot_err(e.to_string()))
}

pub fn read_snapshot(path: impl AsRef<Path>) -> Result<PublicationCycle> {
    let path = path.as_ref();
    let snapshot_err = |reason: String| SyncError::Snapshot {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = atomic_read(path).map_err(|e| snapshot_err(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| snapshot_err(e.to_string()))
}
