use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Errors raised while synchronizing a cycle.
///
/// Only [`SyncError::Merge`] sends a unit back for another download pass.
/// Everything else ends the unit (or the run, for errors that are not tied
/// to a unit) and shows up in the final report.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{unit}: filesystem error: {source}")]
    Fs {
        unit:   String,
        #[source]
        source: aipsync_fs::Error,
    },

    #[error("{unit}: cannot merge {artifact}: {reason}")]
    Merge {
        unit:     String,
        artifact: String,
        reason:   String,
    },

    #[error("{unit}: cannot write {path}: {reason}")]
    Artifact {
        unit:   String,
        path:   PathBuf,
        reason: String,
    },

    #[error("{unit}: gave up after {attempts} download passes")]
    RetryCeiling { unit: String, attempts: u32 },

    #[error("no active publication cycle at {0}")]
    NoActiveCycle(DateTime<Utc>),

    #[error("cannot load catalog {path}: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("run state {path}: {reason}")]
    State { path: PathBuf, reason: String },

    #[error("cannot write snapshot {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unit {0} is not in the catalog")]
    UnknownUnit(String),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Fetch(#[from] aipsync_fetch::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Whether the unit should be downloaded again from scratch.
    pub fn is_retryable(&self) -> bool { matches!(self, SyncError::Merge { .. }) }

    /// Unit the error belongs to, when it is scoped to one.
    pub fn unit(&self) -> Option<&str> {
        match self {
            SyncError::Fs { unit, .. }
            | SyncError::Merge { unit, .. }
            | SyncError::Artifact { unit, .. }
            | SyncError::RetryCeiling { unit, .. } => Some(unit),
            _ => None,
        }
    }

    pub(crate) fn fs(unit: &str, source: aipsync_fs::Error) -> Self {
        SyncError::Fs {
            unit: unit.to_string(),
            source,
        }
    }
}
