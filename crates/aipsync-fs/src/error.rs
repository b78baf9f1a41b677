use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stat {path}: {source}")]
    Metadata {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to set modification time of {path}: {source}")]
    SetTimes {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} is not a regular file")]
    NotRegularFile(PathBuf),

    #[error("{0} has no parent directory")]
    NoParent(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Path the failed operation was working on.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Error::Read { path, .. }
            | Error::Write { path, .. }
            | Error::Metadata { path, .. }
            | Error::CreateDir { path, .. }
            | Error::SetTimes { path, .. } => path,
            Error::NotRegularFile(path) | Error::NoParent(path) => path,
        }
    }
}
