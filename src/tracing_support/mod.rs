//! Distributed tracing primitives.
//!
//! - [`TraceContext`]: span identity that crosses process boundaries
//! - [`Propagator`]: header wire formats ([`W3CTraceContext`], [`B3Propagator`])
//! - [`Span`] / [`Tracer`] / [`SpanExporter`]: the seams the Observer's span
//!   stack is built on, with [`BasicTracer`] and [`TracingExporter`] provided
//! - [`CallMetrics`]: an in-process registry of outbound call metrics
//!
//! ## Example
//!
//! ```rust
//! use http::HeaderMap;
//! use o11y::tracing_support::{Propagator, W3CTraceContext};
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(
//!     "traceparent",
//!     "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".parse().unwrap(),
//! );
//!
//! let remote = W3CTraceContext.extract(&headers).unwrap();
//! let local = remote.child();
//! assert_eq!(local.trace_id(), remote.trace_id());
//! ```

mod context;
mod metrics;
mod propagator;
mod span;
mod tracer;

pub use context::{SpanId, TraceContext, TraceContextError, TraceFlags, TraceId};
pub use metrics::{CallKey, CallMetrics, CallStats};
pub use propagator::{B3Propagator, HeaderExtractor, HeaderInjector, Propagator, W3CTraceContext};
pub use span::{Attributes, BasicSpan, FinishedSpan, Span, SpanEvent, SpanKind, SpanStatus, SpanValue};
pub use tracer::{BasicTracer, SpanExporter, Tracer, TracingExporter};
