//! Inbound request middleware for tower services.
//!
//! [`ObserveLayer`] gives every request its own Observer: it resets the
//! Observer found in the layer's context, tags it with the request's origin
//! and a fresh request id, optionally opens a server span, and hands the
//! resulting [`Context`] to the inner service as a request extension.
//! [`MetricsLayer`] records one metrics data point per answered request.
//!
//! ## Example
//!
//! ```rust
//! use std::convert::Infallible;
//! use o11y::inbound::{request_context, ObserveLayer};
//! use o11y::testing::test_observer;
//! use tower::{service_fn, ServiceBuilder};
//!
//! # fn main() -> o11y::Result<()> {
//! let test = test_observer();
//! let service = ServiceBuilder::new()
//!     .layer(ObserveLayer::new(&test.cx)?)
//!     .service(service_fn(|req: http::Request<String>| async move {
//!         let cx = request_context(&req).cloned().unwrap_or_default();
//!         let _ = o11y::observer::get(&cx).map(|obs| obs.info("handling", Default::default()));
//!         Ok::<_, Infallible>(http::Response::new(String::new()))
//!     }));
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, USER_AGENT};
use http::{Request, Response};
use serde_json::json;
use tower::{Layer, Service};

use crate::context::RequestId;
use crate::error::Result;
use crate::fields::names;
use crate::observer;
use crate::tracing_support::{Propagator, SpanEvent, SpanKind, SpanStatus, W3CTraceContext};
use crate::transport::{MetricsRecorder, PathMask};
use crate::{Context, Fields};

/// Default response header carrying the request id.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Returns the per-request context [`ObserveLayer`] attached to `request`.
pub fn request_context<B>(request: &Request<B>) -> Option<&Context> {
    request.extensions().get::<Context>()
}

/// Tower layer producing [`ObserveService`].
#[derive(Debug, Clone)]
pub struct ObserveLayer {
    cx: Context,
    request_id_header: HeaderName,
}

impl ObserveLayer {
    /// Creates a layer deriving per-request Observers from the one in `cx`.
    ///
    /// # Errors
    ///
    /// Returns an observer-not-found error if `cx` carries no Observer.
    pub fn new(cx: &Context) -> Result<Self> {
        observer::get(cx)?;
        Ok(Self {
            cx: cx.clone(),
            request_id_header: HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER),
        })
    }

    /// Echoes the request id in `header` instead of `x-request-id`.
    #[must_use]
    pub fn request_id_header(mut self, header: HeaderName) -> Self {
        self.request_id_header = header;
        self
    }
}

impl<S> Layer<S> for ObserveLayer {
    type Service = ObserveService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObserveService {
            inner,
            cx: self.cx.clone(),
            request_id_header: self.request_id_header.clone(),
        }
    }
}

/// Tower service wrapping each request in its own Observer.
///
/// Per request:
///
/// 1. generates a request id (v4 UUID)
/// 2. extracts a W3C trace context from the request headers
/// 3. resets the Observer and extends it with `origin` and `request_id`
/// 4. opens a server span `HTTP {method} {path}` when a trace endpoint is configured
/// 5. logs `request received` at debug, calls the inner service, logs `request processed`
///    with the status code, or with the error when the inner service fails
/// 6. ends the span, marking it failed on error, and echoes the request id as a
///    response header on success
#[derive(Debug, Clone)]
pub struct ObserveService<S> {
    inner: S,
    cx: Context,
    request_id_header: HeaderName,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ObserveService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let request_id = RequestId::generate();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();

        let mut cx = observer::reset(&self.cx).with_request_id(request_id.as_str());
        let mut fields = Fields::new()
            .with(names::ORIGIN, json!({
                "client_ip": client_ip(&request),
                "user_agent": header_str(&request, USER_AGENT.as_str()),
                "method": method,
                "path": path,
            }))
            .with(names::REQUEST_ID, request_id.as_str());

        if let Ok(remote) = W3CTraceContext.extract(request.headers()) {
            fields.insert(names::REMOTE_TRACE_ID, remote.trace_id().to_string());
            fields.insert(names::REMOTE_SPAN_ID, remote.span_id().to_string());
            cx = cx.with_trace_context(remote);
        }

        let mut span_opened = false;
        if let Ok(obs) = observer::get(&cx)
            && obs.config().trace_endpoint().is_some()
        {
            let name = format!("HTTP {method} {path}");
            let tracer = obs.tracer().as_ref();
            if let Ok((span_cx, _)) = observer::span(&cx, tracer, &name, SpanKind::Server) {
                if let Some(trace) = span_cx.trace_context() {
                    fields.insert(names::SPAN_ID, trace.span_id().to_string());
                    fields.insert(names::TRACE_ID, trace.trace_id().to_string());
                }
                cx = span_cx;
                span_opened = true;
            }
        }

        let obs = match observer::extend(&cx, fields) {
            Ok((extended, obs)) => {
                cx = extended;
                Some(obs)
            },
            Err(err) => {
                tracing::warn!(error = %err, "inbound request has no observer");
                None
            },
        };
        if let Some(obs) = &obs {
            obs.debug("request received", Fields::new());
        }

        request.extensions_mut().insert(cx.clone());
        let header = self.request_id_header.clone();

        Box::pin(async move {
            let mut result = inner.call(request).await;

            let outcome = match &mut result {
                Ok(response) => {
                    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                        response.headers_mut().insert(header, value);
                    }
                    Fields::new().with(names::STATUS_CODE, response.status().as_u16())
                },
                Err(err) => {
                    let message = err.to_string();
                    if span_opened
                        && let Some(span) = obs.as_ref().and_then(|obs| obs.current_span())
                    {
                        span.add_event(
                            SpanEvent::EXCEPTION,
                            vec![(SpanEvent::EXCEPTION_MESSAGE.to_string(), message.as_str().into())],
                        );
                        span.set_status(SpanStatus::Error(message.clone()));
                    }
                    Fields::new().with(names::ERROR, message)
                },
            };
            if let Some(obs) = &obs {
                obs.debug("request processed", outcome);
            }
            if span_opened && let Err(err) = observer::end(&cx) {
                tracing::warn!(error = %err, "could not end request span");
            }

            result
        })
    }
}

/// Tower layer producing [`MetricsService`].
///
/// Records status, method, masked path and start time for every request the
/// inner service answers. Requests whose inner service fails are not
/// recorded.
///
/// ```rust
/// use o11y::inbound::MetricsLayer;
/// use o11y::tracing_support::CallMetrics;
///
/// let metrics = CallMetrics::new();
/// let layer = MetricsLayer::new(metrics.recorder())
///     .path_mask(std::sync::Arc::new(|path: &str| path.to_string()));
/// # let _ = layer;
/// ```
#[derive(Clone)]
pub struct MetricsLayer {
    recorder: MetricsRecorder,
    path_mask: Option<PathMask>,
}

impl MetricsLayer {
    /// Creates a layer recording the raw request path.
    pub fn new(recorder: MetricsRecorder) -> Self {
        Self { recorder, path_mask: None }
    }

    /// Rewrites paths with `mask` before they are recorded.
    #[must_use]
    pub fn path_mask(mut self, mask: PathMask) -> Self {
        self.path_mask = Some(mask);
        self
    }
}

impl fmt::Debug for MetricsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsLayer")
            .field("path_mask", &self.path_mask.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            recorder: Arc::clone(&self.recorder),
            path_mask: self.path_mask.clone(),
        }
    }
}

/// Tower service recording one metrics data point per answered request.
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    recorder: MetricsRecorder,
    path_mask: Option<PathMask>,
}

impl<S: fmt::Debug> fmt::Debug for MetricsService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsService")
            .field("inner", &self.inner)
            .field("path_mask", &self.path_mask.is_some())
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let start = Instant::now();
        let method = request.method().clone();
        let path = match &self.path_mask {
            Some(mask) => mask(request.uri().path()),
            None => request.uri().path().to_string(),
        };
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = inner.call(request).await;
            match &result {
                Ok(response) => recorder(response.status().as_u16(), &method, &path, start),
                Err(err) => {
                    tracing::debug!(%method, %path, error = %err, "request failed, metrics not recorded")
                },
            }
            result
        })
    }
}

fn header_str<'a, B>(request: &'a Request<B>, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// First `x-forwarded-for` hop, then `x-real-ip`, then the peer address if
/// the server put one in the request extensions.
fn client_ip<B>(request: &Request<B>) -> Option<String> {
    header_str(request, X_FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(request, X_REAL_IP))
        .map(str::to_string)
        .or_else(|| request.extensions().get::<SocketAddr>().map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let request = Request::builder()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .header(X_REAL_IP, "10.0.0.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&request).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_falls_back() {
        let request = Request::builder().header(X_REAL_IP, "10.0.0.2").body(()).unwrap();
        assert_eq!(client_ip(&request).as_deref(), Some("10.0.0.2"));

        let mut request = Request::builder().body(()).unwrap();
        request.extensions_mut().insert(SocketAddr::from(([192, 0, 2, 1], 4000)));
        assert_eq!(client_ip(&request).as_deref(), Some("192.0.2.1"));

        assert_eq!(client_ip(&Request::new(())), None);
    }

    #[test]
    fn test_layer_requires_observer() {
        let err = ObserveLayer::new(&Context::new()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ObserverNotFound);
    }
}
