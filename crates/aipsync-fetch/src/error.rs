//! Error types for aipsync-fetch.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("fetching {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("failed to write {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fs(#[from] aipsync_fs::Error),

    #[error("failed to upload {local} to {remote}: {reason}")]
    Upload {
        local:  PathBuf,
        remote: PathBuf,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn network(url: &str, e: impl std::fmt::Display) -> Self {
        Error::Network {
            url:    url.to_string(),
            reason: e.to_string(),
        }
    }
}
