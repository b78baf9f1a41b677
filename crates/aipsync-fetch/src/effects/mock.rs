use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;

use crate::effects::http::{HttpClient, Response};

#[derive(Debug, Clone, thiserror::Error)]
#[error("mock transport: {0}")]
pub struct MockError(pub String);

#[derive(Debug, Default)]
struct Route {
    body:     Option<Bytes>,
    failures: Option<usize>,
    later:    Option<(usize, Bytes)>,
    requests: usize,
}

/// In-memory [`HttpClient`] serving canned bodies.
///
/// Unknown URLs answer with a 404-style error. A route can be made to fail
/// always or only for its first `n` requests, which is what the retry tests
/// drive.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Mutex<HashMap<String, Route>>,
    delay:  Option<Duration>,
    stall:  Option<Duration>,
}

impl MockHttpClient {
    pub fn new() -> Self { Self::default() }

    pub fn route(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.with_route(url.into(), |r| r.body = Some(body.into()));
        self
    }

    /// Every request to `url` fails.
    pub fn fail(self, url: impl Into<String>) -> Self {
        self.with_route(url.into(), |r| r.failures = Some(usize::MAX));
        self
    }

    /// The first `n` requests to `url` fail, later ones are served.
    pub fn fail_times(self, url: impl Into<String>, n: usize) -> Self {
        self.with_route(url.into(), |r| r.failures = Some(n));
        self
    }

    /// Requests to `url` after the first `n` are served `body` instead.
    pub fn switch_after(self, url: impl Into<String>, n: usize, body: impl Into<Bytes>) -> Self {
        self.with_route(url.into(), |r| r.later = Some((n, body.into())));
        self
    }

    /// Sleep before answering each request.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep between the first and the second half of each body.
    pub fn stall(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    /// Number of requests seen for `url`.
    pub fn requests(&self, url: &str) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .map_or(0, |r| r.requests)
    }

    pub fn total_requests(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|r| r.requests)
            .sum()
    }

    fn with_route(&self, url: String, f: impl FnOnce(&mut Route)) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        f(routes.entry(url).or_default());
    }

    fn answer(&self, url: &str) -> Result<Bytes, MockError> {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let route = routes.entry(url.to_string()).or_default();
        route.requests += 1;

        if let Some(remaining) = route.failures.as_mut().filter(|n| **n > 0) {
            if *remaining != usize::MAX {
                *remaining -= 1;
            }
            return Err(MockError(format!("{url}: injected failure")));
        }

        if let Some((after, body)) = &route.later {
            if route.requests > *after {
                return Ok(body.clone());
            }
        }

        route
            .body
            .clone()
            .ok_or_else(|| MockError(format!("{url}: 404 not found")))
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl HttpClient for MockHttpClient {
    type Error = MockError;

    async fn stream(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<Response<Self::Error>, Self::Error> {
        self.pause().await;
        let body = self.answer(url)?;
        let content_length = Some(body.len() as u64);

        // Two chunks so consumers exercise their accumulation path.
        let split = body.len() / 2;
        let (first, second) = (body.slice(..split), body.slice(split..));
        let stall = self.stall;
        let head = futures_util::stream::once(async move { Ok::<_, MockError>(first) });
        let rest = futures_util::stream::once(async move {
            if let Some(stall) = stall {
                tokio::time::sleep(stall).await;
            }
            Ok::<_, MockError>(second)
        });

        Ok(Response {
            content_length,
            body: Box::pin(head.chain(rest)),
        })
    }
}
