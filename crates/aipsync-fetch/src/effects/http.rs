use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// An open HTTP response whose body has not been consumed yet.
pub struct Response<E> {
    /// Value of the `Content-Length` header, when the server sent one.
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, std::result::Result<Bytes, E>>,
}

impl<E> std::fmt::Debug for Response<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// This trait provides the minimal interface needed for fetching operations.
/// Implementations handle their own redirect following and error mapping, and
/// must report non-success statuses as errors.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - [`MockHttpClient`](crate::MockHttpClient): in-memory routes for tests
pub trait HttpClient: Send + Sync {
    /// Error type for HTTP operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a streaming GET request and return the response body as a stream.
    fn stream(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = std::result::Result<Response<Self::Error>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use std::time::Duration;

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a client with a bounded connection phase.
        pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .user_agent(concat!("aipsync/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self { client })
        }

        /// Wrap an already configured client (cookie jar, proxies, ...).
        pub fn from_client(client: reqwest::Client) -> Self { Self { client } }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn stream(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<Response<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);

            for (key, value) in headers {
                request = request.header(key, value);
            }

            let response = request.send().await?.error_for_status()?;
            let content_length = response.content_length();

            Ok(Response {
                content_length,
                body: Box::pin(response.bytes_stream()),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
