//! Call persistence decorator and the storage collaborator contract.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;

use super::logging::{body_text, elapsed_ms};
use super::traits::{Body, HttpRequest, HttpResponse, ResponseFuture, RoundTrip};
use crate::error::{Error, Result};
use crate::observer::{self, Observer};
use crate::redact::{headers_to_json, redact_headers};
use crate::{Context, Fields, Severity};

/// Collects the fields of one call and commits them.
///
/// A fresh storer is requested from the [`CallStore`] for every call; the
/// decorator calls each setter once, then [`exec`](Self::exec).
pub trait CallStorer: Send {
    /// Request URL.
    fn set_url(&mut self, url: &str);
    /// Request method.
    fn set_method(&mut self, method: &str);
    /// Redacted request headers, JSON-encoded.
    fn set_request_headers(&mut self, headers: Vec<u8>);
    /// Redacted request body.
    fn set_request_body(&mut self, body: Option<String>);
    /// Elapsed time in milliseconds.
    fn set_response_time_ms(&mut self, millis: i64);
    /// Redacted response headers, JSON-encoded.
    fn set_response_headers(&mut self, headers: Vec<u8>);
    /// Redacted response body.
    fn set_response_body(&mut self, body: Option<String>);
    /// Response status code.
    fn set_status_code(&mut self, status: i32);
    /// Commits the record.
    fn exec(self: Box<Self>, cx: Context) -> BoxFuture<'static, Result<()>>;
}

/// Hands out [`CallStorer`]s.
pub trait CallStore: Send + Sync + fmt::Debug {
    /// Returns an empty storer for one call.
    fn storer(&self) -> Box<dyn CallStorer>;
}

/// The persisted shape of one outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiCallRecord {
    /// Request URL.
    pub url: String,
    /// Request method.
    pub method: String,
    /// Redacted request headers as JSON.
    pub request_headers: Vec<u8>,
    /// Redacted request body.
    pub request_body: Option<String>,
    /// Elapsed time in milliseconds.
    pub response_time_ms: i64,
    /// Redacted response headers as JSON.
    pub response_headers: Vec<u8>,
    /// Redacted response body.
    pub response_body: Option<String>,
    /// Response status code.
    pub status_code: i32,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Default for ApiCallRecord {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: String::new(),
            request_headers: Vec::new(),
            request_body: None,
            response_time_ms: 0,
            response_headers: Vec::new(),
            response_body: None,
            status_code: 0,
            created_at: Utc::now(),
        }
    }
}

/// Commits a finished [`ApiCallRecord`].
pub type CommitFn =
    Arc<dyn Fn(ApiCallRecord, Context) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A [`CallStore`] that fills an [`ApiCallRecord`] and hands it to a closure.
///
/// This is the usual way to plug in a database: the closure runs the insert.
#[derive(Clone)]
pub struct RecordStore {
    commit: CommitFn,
}

impl RecordStore {
    /// Creates a store committing through `commit`.
    pub fn new(commit: CommitFn) -> Self {
        Self { commit }
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

impl CallStore for RecordStore {
    fn storer(&self) -> Box<dyn CallStorer> {
        Box::new(RecordStorer { record: ApiCallRecord::default(), commit: Arc::clone(&self.commit) })
    }
}

struct RecordStorer {
    record: ApiCallRecord,
    commit: CommitFn,
}

impl CallStorer for RecordStorer {
    fn set_url(&mut self, url: &str) {
        self.record.url = url.to_string();
    }

    fn set_method(&mut self, method: &str) {
        self.record.method = method.to_string();
    }

    fn set_request_headers(&mut self, headers: Vec<u8>) {
        self.record.request_headers = headers;
    }

    fn set_request_body(&mut self, body: Option<String>) {
        self.record.request_body = body;
    }

    fn set_response_time_ms(&mut self, millis: i64) {
        self.record.response_time_ms = millis;
    }

    fn set_response_headers(&mut self, headers: Vec<u8>) {
        self.record.response_headers = headers;
    }

    fn set_response_body(&mut self, body: Option<String>) {
        self.record.response_body = body;
    }

    fn set_status_code(&mut self, status: i32) {
        self.record.status_code = status;
    }

    fn exec(self: Box<Self>, cx: Context) -> BoxFuture<'static, Result<()>> {
        (self.commit)(self.record, cx)
    }
}

/// Persists every completed call through a [`CallStore`].
///
/// Both bodies are buffered and handed on intact. A failed inner call is
/// returned unchanged and nothing is stored. A failed commit is logged at
/// [`Level::Error`](crate::Level::Error) with severity `high` and turns the
/// call into a [`Persistence`](crate::ErrorKind::Persistence) error even
/// though the HTTP exchange itself succeeded.
#[derive(Debug)]
pub struct StorageTransport {
    inner: Arc<dyn RoundTrip>,
    store: Arc<dyn CallStore>,
    observer: Arc<Observer>,
}

impl StorageTransport {
    /// Wraps `inner`, reporting commit failures through `observer` when a
    /// request carries none.
    pub fn new(inner: Arc<dyn RoundTrip>, store: Arc<dyn CallStore>, observer: Arc<Observer>) -> Self {
        Self { inner, store, observer }
    }
}

impl RoundTrip for StorageTransport {
    fn round_trip(&self, mut request: HttpRequest) -> ResponseFuture<'_> {
        Box::pin(async move {
            let cx = request.context.clone();
            let url = request.url.to_string();
            let method = request.method.to_string();
            let request_headers = encode_headers(&request.headers)?;

            let request_body = std::mem::take(&mut request.body).collect().await?;
            let request_text = body_text(&request_body);
            request.body = Body::Full(request_body);

            let start = Instant::now();
            let mut response = self.inner.round_trip(request).await?;
            let response_body = std::mem::take(&mut response.body).collect().await?;
            let elapsed = start.elapsed();

            let mut storer = self.store.storer();
            storer.set_url(&url);
            storer.set_method(&method);
            storer.set_request_headers(request_headers);
            storer.set_request_body(Some(request_text));
            storer.set_response_time_ms(elapsed_ms(elapsed));
            storer.set_response_headers(encode_headers(&response.headers)?);
            storer.set_response_body(Some(body_text(&response_body)));
            storer.set_status_code(i32::from(response.status.as_u16()));

            if let Err(err) = storer.exec(cx.clone()).await {
                let observer = observer::get(&cx).unwrap_or_else(|_| Arc::clone(&self.observer));
                observer.error(
                    "failed to store request/response",
                    &err,
                    Severity::High,
                    Fields::new(),
                );
                return Err(Error::persistence("failed to store request/response").with_source(err));
            }

            Ok(HttpResponse { body: Body::Full(response_body), ..response })
        })
    }
}

fn encode_headers(headers: &http::HeaderMap) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&headers_to_json(&redact_headers(headers)))?)
}
