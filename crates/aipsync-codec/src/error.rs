use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cannot open {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("{path} is not a valid document: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("page {index} out of range, document has {count} pages")]
    PageOutOfRange { index: usize, count: usize },

    #[error("rendering failed: {0}")]
    Render(String),

    #[error("cannot write {path}: {source}")]
    Write {
        path:   PathBuf,
        #[source]
        source: aipsync_fs::Error,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;
