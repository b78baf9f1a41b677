use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::data::FetchOptions;
use crate::effects::http::{HttpClient, Response};
use crate::error::{Error, Result};

/// Streams remote content to local files.
///
/// The body is written to a hidden `.{name}.part` sibling first and renamed
/// over the destination once the stream ends, so a failed or timed out
/// transfer never leaves a truncated file where a part is expected.
pub struct Fetcher<C: HttpClient> {
    client:  C,
    options: FetchOptions,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Self { Self::with_options(client, FetchOptions::default()) }

    pub fn with_options(client: C, options: FetchOptions) -> Self { Self { client, options } }

    pub fn client(&self) -> &C { &self.client }

    pub fn options(&self) -> &FetchOptions { &self.options }

    /// Fetch `url` into `destination`, returning the number of bytes written.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        let written = self.fetch_if(url, destination, |_| true).await?;
        Ok(written.unwrap_or_default())
    }

    /// Open `url` and write it to `destination` only if `should_write` agrees.
    ///
    /// The predicate receives the response's content length before any byte
    /// of the body is read. Returns `None` when the write was skipped.
    pub async fn fetch_if<F>(
        &self,
        url: &str,
        destination: &Path,
        should_write: F,
    ) -> Result<Option<u64>>
    where
        F: FnOnce(Option<u64>) -> bool + Send,
    {
        self.bounded(url, destination, async {
            let response = self
                .client
                .stream(url, &self.options.headers)
                .await
                .map_err(|e| Error::network(url, e))?;

            if !should_write(response.content_length) {
                debug!(url, "destination is current, skipping body");
                return Ok(None);
            }

            self.place(url, destination, response).await.map(Some)
        })
        .await
    }

    async fn place(&self, url: &str, destination: &Path, response: Response<C::Error>) -> Result<u64> {
        let parent = destination
            .parent()
            .ok_or_else(|| Error::Fs(aipsync_fs::Error::NoParent(destination.to_path_buf())))?;
        aipsync_fs::ensure_dir(parent)?;

        let staging = staging_path(destination);
        let result = stream_to(url, &staging, response).await;

        let written = match result {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        if let Err(source) = tokio::fs::rename(&staging, destination).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(Error::Io {
                path: destination.to_path_buf(),
                source,
            });
        }

        debug!(url, path = %destination.display(), bytes = written, "fetched");
        Ok(written)
    }

    /// Run `work` under the configured timeout. An expired fetch is dropped
    /// mid-stream, so its staging file is removed here.
    async fn bounded<T>(
        &self,
        url: &str,
        destination: &Path,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let Some(after) = self.options.timeout else {
            return work.await;
        };

        match tokio::time::timeout(after, work).await {
            Ok(result) => result,
            Err(_) => {
                let _ = tokio::fs::remove_file(staging_path(destination)).await;
                Err(Error::Timeout {
                    url: url.to_string(),
                    after,
                })
            }
        }
    }
}

async fn stream_to<E: std::fmt::Display>(
    url: &str,
    staging: &Path,
    mut response: Response<E>,
) -> Result<u64> {
    let io_err = |source| Error::Io {
        path: staging.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(staging).await.map_err(io_err)?;
    let mut written = 0u64;

    while let Some(chunk) = response.body.next().await {
        let chunk = chunk.map_err(|e| Error::network(url, e))?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(io_err)?;
    Ok(written)
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    name.push(".part");
    destination.with_file_name(name)
}
