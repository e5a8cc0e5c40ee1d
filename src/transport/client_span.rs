//! Client span decorator.

use std::sync::Arc;

use super::traits::{HttpRequest, ResponseFuture, RoundTrip};
use crate::tracing_support::{SpanKind, SpanStatus, Tracer};

/// Opens a client span around each call.
///
/// The span is a child of the request context's active trace, and the
/// request continues with the span as its active trace, so a
/// [`PropagationTransport`](super::PropagationTransport) further in sends the
/// client span's id downstream. Responses of 500 and above, and transport
/// errors, end the span with an error status.
#[derive(Debug)]
pub struct TracingTransport {
    inner: Arc<dyn RoundTrip>,
    tracer: Arc<dyn Tracer>,
}

impl TracingTransport {
    /// Wraps `inner`, starting spans on `tracer`.
    pub fn new(inner: Arc<dyn RoundTrip>, tracer: Arc<dyn Tracer>) -> Self {
        Self { inner, tracer }
    }
}

impl RoundTrip for TracingTransport {
    fn round_trip(&self, mut request: HttpRequest) -> ResponseFuture<'_> {
        let name = format!("HTTP {} {}", request.method, request.url.path());
        let span = self.tracer.start(
            request.context.trace_context(),
            &name,
            SpanKind::Client,
            vec![
                ("http.method".to_string(), request.method.as_str().into()),
                ("http.url".to_string(), request.url.as_str().into()),
            ],
        );
        request.context = request.context.with_trace_context(span.trace_context().clone());

        Box::pin(async move {
            let result = self.inner.round_trip(request).await;
            match &result {
                Ok(response) => {
                    let status = response.status;
                    span.set_attributes(vec![(
                        "http.status_code".to_string(),
                        i64::from(status.as_u16()).into(),
                    )]);
                    span.set_status(if status.is_server_error() {
                        SpanStatus::Error(format!("HTTP {}", status.as_u16()))
                    } else {
                        SpanStatus::Ok
                    });
                },
                Err(err) => {
                    span.record_error(err);
                    span.set_status(SpanStatus::Error(err.to_string()));
                },
            }
            span.end();
            result
        })
    }
}
