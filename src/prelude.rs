//! Prelude module for convenient imports.
//!
//! ```rust
//! use o11y::prelude::*;
//! ```
//!
//! This provides access to:
//! - The Observer and its context operations
//! - Configuration, levels and fields
//! - Error types
//! - Tracing and transport types

pub use crate::{
    config::{Configurator, ObserverConfig},
    context::{Context, RequestId},
    error::{Error, ErrorKind, Result},
    fields::Fields,
    level::{Level, Severity},
    observer::{self, Observer, ObserverSetup},
    sink::{JsonSink, LogRecord, LogSink, TracingSink},
    tracing_support::{Propagator, SpanKind, TraceContext, Tracer, W3CTraceContext},
    transport::{Body, HttpRequest, HttpResponse, RoundTrip, TransportBuilder},
};
