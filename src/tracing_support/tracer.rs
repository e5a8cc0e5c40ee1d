//! Span creation and export.
//!
//! A [`Tracer`] starts spans; a [`SpanExporter`] receives them once they end.
//! [`BasicTracer`] is the provided tracer and [`TracingExporter`] the provided
//! exporter, which turns every finished span into a `tracing` event so that
//! whatever subscriber the host installed (console, OTLP bridge, ...) sees it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::tracing_support::span::{Attributes, BasicSpan, FinishedSpan, Span, SpanKind};
use crate::tracing_support::TraceContext;

/// Starts spans and owns the export pipeline.
pub trait Tracer: Send + Sync + fmt::Debug {
    /// Starts a span as a child of `parent`, or as a new root when `parent` is `None`.
    fn start(
        &self,
        parent: Option<&TraceContext>,
        name: &str,
        kind: SpanKind,
        attributes: Attributes,
    ) -> Arc<dyn Span>;

    /// Flushes and stops the export pipeline.
    fn shutdown(&self) -> Result<()>;
}

/// Receives spans as they end.
pub trait SpanExporter: Send + Sync + fmt::Debug {
    /// Exports one finished span.
    fn export(&self, span: FinishedSpan);

    /// Flushes anything buffered. Called once, by [`Tracer::shutdown`].
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A [`Tracer`] that builds [`BasicSpan`]s and forwards them to one exporter.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use o11y::tracing_support::{BasicTracer, SpanKind, Tracer, TracingExporter};
///
/// let tracer = BasicTracer::new(Arc::new(TracingExporter::new("billing")));
/// let span = tracer.start(None, "charge", SpanKind::Internal, Vec::new());
/// span.end();
/// tracer.shutdown().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct BasicTracer {
    exporter: Arc<dyn SpanExporter>,
    shut_down: Arc<AtomicBool>,
}

impl BasicTracer {
    /// Creates a tracer exporting to `exporter`.
    pub fn new(exporter: Arc<dyn SpanExporter>) -> Self {
        Self { exporter, shut_down: Arc::new(AtomicBool::new(false)) }
    }

    /// Returns `true` once [`shutdown`](Tracer::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Tracer for BasicTracer {
    fn start(
        &self,
        parent: Option<&TraceContext>,
        name: &str,
        kind: SpanKind,
        attributes: Attributes,
    ) -> Arc<dyn Span> {
        let trace_context = parent.map_or_else(TraceContext::new_root, TraceContext::child);
        Arc::new(BasicSpan::start(name, kind, trace_context, attributes, self.exporter.clone()))
    }

    fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.exporter.shutdown()
    }
}

/// Exports finished spans as `tracing` events on the `o11y::span` target.
#[derive(Debug, Clone)]
pub struct TracingExporter {
    service_name: String,
}

impl TracingExporter {
    /// Creates an exporter that tags every span with `service_name`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }
}

impl SpanExporter for TracingExporter {
    fn export(&self, span: FinishedSpan) {
        let ctx = span.trace_context();
        let attributes: Vec<String> =
            span.attributes().iter().map(|(k, v)| format!("{k}={v}")).collect();
        let events: Vec<&str> = span.events().iter().map(|e| e.name.as_str()).collect();

        tracing::info!(
            target: "o11y::span",
            service = %self.service_name,
            name = span.name(),
            kind = %span.kind(),
            trace_id = %ctx.trace_id(),
            span_id = %ctx.span_id(),
            parent_span_id = ?ctx.parent_span_id().map(ToString::to_string),
            duration_ms = span.duration().as_secs_f64() * 1000.0,
            status = %span.status(),
            attributes = ?attributes,
            events = ?events,
            "span finished"
        );
    }

    fn shutdown(&self) -> Result<()> {
        tracing::debug!(target: "o11y::span", service = %self.service_name, "exporter shut down");
        Ok(())
    }
}
