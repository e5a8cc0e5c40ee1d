//! Call metrics decorator.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::Method;

use super::traits::{HttpRequest, ResponseFuture, RoundTrip};

/// Receives one data point per completed call: status, method, path and start time.
///
/// [`CallMetrics::recorder`](crate::tracing_support::CallMetrics::recorder)
/// returns one backed by an in-process registry.
pub type MetricsRecorder = Arc<dyn Fn(u16, &Method, &str, Instant) + Send + Sync>;

/// Rewrites a URL path before it is recorded, typically collapsing ids so
/// `/users/42` and `/users/43` share a series.
pub type PathMask = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Records status, method, masked path and start time for every call that
/// gets a response.
///
/// Calls that fail without a response are not recorded.
pub struct MetricsTransport {
    inner: Arc<dyn RoundTrip>,
    recorder: MetricsRecorder,
    path_mask: Option<PathMask>,
}

impl MetricsTransport {
    /// Wraps `inner`. Without a `path_mask` the raw path is recorded.
    pub fn new(
        inner: Arc<dyn RoundTrip>,
        recorder: MetricsRecorder,
        path_mask: Option<PathMask>,
    ) -> Self {
        Self { inner, recorder, path_mask }
    }
}

impl fmt::Debug for MetricsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsTransport")
            .field("inner", &self.inner)
            .field("path_mask", &self.path_mask.is_some())
            .finish_non_exhaustive()
    }
}

impl RoundTrip for MetricsTransport {
    fn round_trip(&self, request: HttpRequest) -> ResponseFuture<'_> {
        let start = Instant::now();
        let method = request.method.clone();
        let path = match &self.path_mask {
            Some(mask) => mask(request.url.path()),
            None => request.url.path().to_string(),
        };

        Box::pin(async move {
            let result = self.inner.round_trip(request).await;
            match &result {
                Ok(response) => (self.recorder)(response.status.as_u16(), &method, &path, start),
                Err(err) => {
                    tracing::debug!(%method, %path, error = %err, "call failed, metrics not recorded")
                },
            }
            result
        })
    }
}
