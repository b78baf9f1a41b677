use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Destination for merged artifacts once a run has completed.
///
/// `remote` is relative to whatever root the implementation publishes into.
pub trait Uploader: Send + Sync {
    fn upload(&self, local: &Path, remote: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Publishes by mirroring files under a local root, e.g. a mounted share.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }
}

impl Uploader for DirectoryUploader {
    async fn upload(&self, local: &Path, remote: &Path) -> Result<()> {
        let target = self.root.join(remote);
        let upload_err = |reason: String| Error::Upload {
            local: local.to_path_buf(),
            remote: target.clone(),
            reason,
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_err(e.to_string()))?;
        }

        let bytes = tokio::fs::copy(local, &target)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        debug!(local = %local.display(), remote = %target.display(), bytes, "uploaded");
        Ok(())
    }
}
