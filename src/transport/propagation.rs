//! Trace context propagation decorator.

use std::sync::Arc;

use super::traits::{HttpRequest, ResponseFuture, RoundTrip};
use crate::tracing_support::{Propagator, W3CTraceContext};

/// Injects the request context's active trace into outbound headers.
///
/// Requests whose context has no active trace pass through untouched.
#[derive(Debug)]
pub struct PropagationTransport<P = W3CTraceContext> {
    inner: Arc<dyn RoundTrip>,
    propagator: P,
}

impl PropagationTransport<W3CTraceContext> {
    /// Wraps `inner`, injecting W3C `traceparent`/`tracestate` headers.
    pub fn w3c(inner: Arc<dyn RoundTrip>) -> Self {
        Self::new(inner, W3CTraceContext)
    }
}

impl<P: Propagator> PropagationTransport<P> {
    /// Wraps `inner`, injecting headers in `propagator`'s format.
    pub fn new(inner: Arc<dyn RoundTrip>, propagator: P) -> Self {
        Self { inner, propagator }
    }
}

impl<P: Propagator + std::fmt::Debug> RoundTrip for PropagationTransport<P> {
    fn round_trip(&self, mut request: HttpRequest) -> ResponseFuture<'_> {
        if let Some(trace_context) = request.context.trace_context() {
            self.propagator.inject(trace_context, &mut request.headers);
        }
        self.inner.round_trip(request)
    }
}
