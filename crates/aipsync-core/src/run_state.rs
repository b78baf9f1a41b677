//! Between-run memory: when the next cycle becomes effective.

use std::path::Path;

use aipsync_fs::{AtomicWriteOptions, atomic_read, atomic_write};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub effective_date:      Option<DateTime<Utc>>,
    pub next_effective_date: Option<DateTime<Utc>>,
    pub last_run:            Option<DateTime<Utc>>,
}

impl RunState {
    /// Read the stored state; a missing file is an empty state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let state_err = |reason: String| SyncError::State {
            path: path.to_path_buf(),
            reason,
        };

        match aipsync_fs::stat(path).map_err(|e| state_err(e.to_string()))? {
            None => Ok(Self::default()),
            Some(_) => {
                let bytes = atomic_read(path).map_err(|e| state_err(e.to_string()))?;
                serde_json::from_slice(&bytes).map_err(|e| state_err(e.to_string()))
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let state_err = |reason: String| SyncError::State {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            aipsync_fs::ensure_dir(parent).map_err(|e| state_err(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| state_err(e.to_string()))?;
        atomic_write(path, &json, AtomicWriteOptions::default()).map_err(|e| state_err(e.to_string()))
    }

    /// A run is due once the stored next effective date has been reached,
    /// or when nothing is known yet.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_effective_date.is_none_or(|next| now >= next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_due() {
        let dir = TempDir::new().unwrap();
        let state = RunState::load(dir.path().join("state.json")).unwrap();
        assert_eq!(state, RunState::default());
        assert!(state.is_due(Utc::now()));
    }

    #[test]
    fn test_saved_state_gates_next_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state.json");
        let next = Utc.with_ymd_and_hms(2026, 10, 29, 0, 0, 0).unwrap();

        RunState {
            effective_date:      Some(next - Duration::days(28)),
            next_effective_date: Some(next),
            last_run:            Some(next - Duration::days(10)),
        }
        .save(&path)
        .unwrap();

        let state = RunState::load(&path).unwrap();
        assert!(!state.is_due(next - Duration::seconds(1)));
        assert!(state.is_due(next));
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(RunState::load(&path), Err(SyncError::State { .. })));
    }
}
