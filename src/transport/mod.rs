//! Instrumented outbound HTTP.
//!
//! A [`RoundTrip`] performs one HTTP call. Decorators wrap another
//! `RoundTrip` and add one concern each:
//!
//! | Decorator                | Adds                                                   |
//! |--------------------------|--------------------------------------------------------|
//! | [`LoggingTransport`]     | request/response records with redacted headers and bodies |
//! | [`PropagationTransport`] | trace context headers from the request's context       |
//! | [`MetricsTransport`]     | one recorder call per response                         |
//! | [`StorageTransport`]     | one persisted [`ApiCallRecord`] per call               |
//! | [`TracingTransport`]     | one client span per call                               |
//!
//! [`TransportBuilder`] composes them around a terminal transport such as
//! [`RestTransport`].
//!
//! ## Feature Flags
//!
//! - `rest` (default): [`RestTransport`] over reqwest

mod chain;
mod client_span;
mod logging;
mod metrics;
mod propagation;
mod storage;
mod traits;

#[cfg(feature = "rest")]
mod rest;

pub use chain::TransportBuilder;
pub use client_span::TracingTransport;
pub use logging::LoggingTransport;
pub use metrics::{MetricsRecorder, MetricsTransport, PathMask};
pub use propagation::PropagationTransport;
pub use storage::{ApiCallRecord, CallStore, CallStorer, CommitFn, RecordStore, StorageTransport};
pub use traits::{
    Body, BodyStream, HttpRequest, HttpResponse, ResponseFuture, RoundTrip, RoundTripFn,
};

#[cfg(feature = "rest")]
pub use rest::{RestTransport, RestTransportBuilder};
