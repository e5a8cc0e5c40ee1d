//! A canned-response transport that records what it was sent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use url::Url;

use crate::tracing_support::TraceContext;
use crate::transport::{Body, HttpRequest, HttpResponse, ResponseFuture, RoundTrip};
use crate::Error;

/// A request as seen by [`MockTransport`], body fully read.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// The active trace in the request's context.
    pub trace_context: Option<TraceContext>,
}

/// Terminal transport for tests.
///
/// Answers every request with the same response (`200 OK`, empty body, by
/// default) unless a failure is queued with [`fail_next`](Self::fail_next).
///
/// ## Example
///
/// ```rust
/// use http::StatusCode;
/// use o11y::testing::MockTransport;
///
/// let mock = MockTransport::new().respond_with(StatusCode::CREATED, r#"{"id":1}"#);
/// assert_eq!(mock.request_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
    failure: Mutex<Option<Error>>,
    request_count: AtomicU64,
}

impl MockTransport {
    /// Creates a transport answering `200 OK` with an empty body.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: None,
            requests: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            request_count: AtomicU64::new(0),
        }
    }

    /// Sets the canned status and body.
    #[must_use]
    pub fn respond_with(mut self, status: StatusCode, body: impl Into<Bytes>) -> Self {
        self.status = status;
        self.body = body.into();
        self
    }

    /// Adds a header to the canned response.
    #[must_use]
    pub fn with_response_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Waits `delay` before answering each request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the next request fail with `error`.
    pub fn fail_next(&self, error: Error) {
        *self.failure.lock() = Some(error);
    }

    /// Returns every request received, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received, failed ones included.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTrip for MockTransport {
    fn round_trip(&self, request: HttpRequest) -> ResponseFuture<'_> {
        Box::pin(async move {
            self.request_count.fetch_add(1, Ordering::Relaxed);

            let trace_context = request.context.trace_context().cloned();
            let HttpRequest { method, url, headers, body, .. } = request;
            let body = body.collect().await?;
            self.requests.lock().push(RecordedRequest { method, url, headers, body, trace_context });

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(error) = self.failure.lock().take() {
                return Err(error);
            }

            Ok(HttpResponse {
                status: self.status,
                headers: self.headers.clone(),
                body: Body::Full(self.body.clone()),
            })
        })
    }
}
