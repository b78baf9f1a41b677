//! I/O operations for fetching and publishing.
//!
//! Everything that touches the network or the filesystem lives here, behind
//! the [`HttpClient`] and [`Uploader`] traits so callers can substitute test
//! doubles.

mod fetcher;
mod http;
mod mock;
mod upload;

pub use fetcher::Fetcher;
pub use http::{BoxStream, HttpClient, Response};
pub use mock::{MockError, MockHttpClient};
pub use upload::{DirectoryUploader, Uploader};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
