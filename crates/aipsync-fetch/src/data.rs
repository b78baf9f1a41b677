//! Data layer: immutable fetch configuration.

use std::time::Duration;

/// Configuration for a [`Fetcher`](crate::Fetcher).
///
/// # Examples
///
/// ```
/// use aipsync_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .timeout(Duration::from_secs(30))
///     .header("Accept", "application/pdf");
/// ```
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Upper bound for one fetch, connection and body included.
    /// `None` lets a stalled transfer block forever.
    pub timeout: Option<Duration>,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(120)),
            headers: Vec::new(),
        }
    }
}

impl FetchOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}
