//! Request/response logging decorator.

use std::sync::Arc;
use std::time::Instant;

use super::traits::{Body, HttpRequest, HttpResponse, ResponseFuture, RoundTrip};
use crate::fields::names;
use crate::observer::{self, Observer};
use crate::redact::{headers_to_json, redact_body, redact_headers};
use crate::fields;

/// Logs every outbound call at [`Level::Info`](crate::Level::Info).
///
/// Two records per call: `outbound call - request` with redacted headers,
/// method, URL and redacted body, then `outbound call - response` with the
/// elapsed milliseconds, status, redacted headers and redacted body. Both
/// bodies are buffered so the caller and the inner transport still see them
/// in full. A failed inner call is returned unchanged and logs no response.
///
/// Records go to the Observer in the request's context, falling back to the
/// one captured when the decorator was built.
#[derive(Debug)]
pub struct LoggingTransport {
    inner: Arc<dyn RoundTrip>,
    observer: Arc<Observer>,
}

impl LoggingTransport {
    /// Wraps `inner`, logging through `observer` when a request carries none.
    pub fn new(inner: Arc<dyn RoundTrip>, observer: Arc<Observer>) -> Self {
        Self { inner, observer }
    }
}

impl RoundTrip for LoggingTransport {
    fn round_trip(&self, mut request: HttpRequest) -> ResponseFuture<'_> {
        Box::pin(async move {
            let observer =
                observer::get(&request.context).unwrap_or_else(|_| Arc::clone(&self.observer));

            let request_body = std::mem::take(&mut request.body).collect().await?;
            observer.info(
                "outbound call - request",
                fields![
                    names::REQUEST_HEADERS => headers_to_json(&redact_headers(&request.headers)),
                    names::REQUEST_METHOD => request.method.as_str(),
                    names::REQUEST_URL => request.url.as_str(),
                    names::REQUEST_BODY => body_text(&request_body),
                ],
            );
            request.body = Body::Full(request_body);

            let start = Instant::now();
            let mut response = self.inner.round_trip(request).await?;
            let response_body = std::mem::take(&mut response.body).collect().await?;
            let elapsed = start.elapsed();

            observer.info(
                "outbound call - response",
                fields![
                    names::CALL_DURATION => elapsed_ms(elapsed),
                    names::STATUS_CODE => response.status.as_u16(),
                    names::RESPONSE_HEADERS => headers_to_json(&redact_headers(&response.headers)),
                    names::RESPONSE_BODY => body_text(&response_body),
                ],
            );

            Ok(HttpResponse { body: Body::Full(response_body), ..response })
        })
    }
}

/// Redacts a body and renders it as text.
pub(super) fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(&redact_body(body)).into_owned()
}

pub(super) fn elapsed_ms(elapsed: std::time::Duration) -> i64 {
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}
