//! Streaming HTTP fetches with staged placement for the aipsync archive.
//!
//! # Architecture
//!
//! The crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration
//! - [`core`] - Pure transformations (URL resolution, backoff)
//! - [`effects`] - I/O operations behind the [`HttpClient`] and [`Uploader`] traits
//!
//! Mechanism only: the fetcher reports success or failure and never retries
//! on its own. Retry policy belongs to the caller.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use self::core::{resolve_url, retry_delay};
pub use data::FetchOptions;
pub use effects::{
    BoxStream, DirectoryUploader, Fetcher, HttpClient, MockError, MockHttpClient, Response,
    Uploader,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{Error, Result};
