//! Span types and the live span handle the Observer stacks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::tracing_support::TraceContext;
use crate::tracing_support::tracer::SpanExporter;

/// Kind of span, indicating its role in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    /// An outgoing request.
    Client,
    /// An incoming request.
    Server,
    /// Work inside the process.
    #[default]
    Internal,
    /// An asynchronous message send.
    Producer,
    /// An asynchronous message receive.
    Consumer,
}

impl SpanKind {
    /// Returns the OpenTelemetry span kind value.
    pub fn otel_value(&self) -> i32 {
        match self {
            SpanKind::Internal => 1,
            SpanKind::Server => 2,
            SpanKind::Client => 3,
            SpanKind::Producer => 4,
            SpanKind::Consumer => 5,
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpanKind::Client => "client",
            SpanKind::Server => "server",
            SpanKind::Internal => "internal",
            SpanKind::Producer => "producer",
            SpanKind::Consumer => "consumer",
        })
    }
}

/// Status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    /// No status was set.
    #[default]
    Unset,
    /// The operation completed successfully.
    Ok,
    /// The operation failed.
    Error(String),
}

impl SpanStatus {
    /// Returns `true` if the span status is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }

    /// Returns the error message if this is an error status.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SpanStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanStatus::Unset => write!(f, "unset"),
            SpanStatus::Ok => write!(f, "ok"),
            SpanStatus::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// A value that can be attached to a span as an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanValue {
    /// A string value.
    String(String),
    /// An integer value.
    Int(i64),
    /// A float value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl SpanValue {
    /// Returns the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SpanValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SpanValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SpanValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for SpanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanValue::String(s) => f.write_str(s),
            SpanValue::Int(i) => write!(f, "{}", i),
            SpanValue::Float(fl) => write!(f, "{}", fl),
            SpanValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for SpanValue {
    fn from(s: &str) -> Self {
        SpanValue::String(s.to_string())
    }
}

impl From<String> for SpanValue {
    fn from(s: String) -> Self {
        SpanValue::String(s)
    }
}

impl From<i64> for SpanValue {
    fn from(i: i64) -> Self {
        SpanValue::Int(i)
    }
}

impl From<f64> for SpanValue {
    fn from(f: f64) -> Self {
        SpanValue::Float(f)
    }
}

impl From<bool> for SpanValue {
    fn from(b: bool) -> Self {
        SpanValue::Bool(b)
    }
}

/// Log field values become span attributes: scalars keep their type,
/// anything structured is attached as its JSON text.
impl From<&serde_json::Value> for SpanValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => SpanValue::String(s.clone()),
            serde_json::Value::Bool(b) => SpanValue::Bool(*b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => SpanValue::Int(i),
                (None, Some(f)) => SpanValue::Float(f),
                (None, None) => SpanValue::String(n.to_string()),
            },
            other => SpanValue::String(other.to_string()),
        }
    }
}

/// Span attributes, in insertion order.
pub type Attributes = Vec<(String, SpanValue)>;

/// A timestamped annotation on a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanEvent {
    /// The event name.
    pub name: String,
    /// When the event was added.
    pub timestamp: DateTime<Utc>,
    /// Event attributes.
    pub attributes: Attributes,
}

impl SpanEvent {
    /// Name given to events produced by [`Span::record_error`].
    pub const EXCEPTION: &'static str = "exception";
    /// Attribute holding the recorded error's message.
    pub const EXCEPTION_MESSAGE: &'static str = "exception.message";
}

/// A live span.
///
/// The Observer holds spans as `Arc<dyn Span>`; every method takes `&self`
/// so one span can be shared between Observers derived from each other.
/// Ending is idempotent: only the first [`end`](Span::end) exports.
pub trait Span: Send + Sync + fmt::Debug {
    /// The span name.
    fn name(&self) -> &str;

    /// The span kind.
    fn kind(&self) -> SpanKind;

    /// This span's identity, which children are parented to.
    fn trace_context(&self) -> &TraceContext;

    /// Sets attributes, replacing any with the same key.
    fn set_attributes(&self, attributes: Attributes);

    /// Adds a named event.
    fn add_event(&self, name: &str, attributes: Attributes);

    /// Records an error as an `exception` event.
    fn record_error(&self, error: &dyn std::error::Error);

    /// Sets the span status.
    fn set_status(&self, status: SpanStatus);

    /// Ends the span. Calls after the first are no-ops.
    fn end(&self);

    /// Returns `true` once the span has ended.
    fn is_ended(&self) -> bool;
}

#[derive(Debug, Default)]
struct SpanState {
    attributes: Attributes,
    events: Vec<SpanEvent>,
    status: SpanStatus,
}

/// The span produced by [`BasicTracer`](crate::tracing_support::BasicTracer).
///
/// Collects attributes and events in memory and hands a [`FinishedSpan`] to
/// its exporter when it ends. Mutations after `end` are ignored.
pub struct BasicSpan {
    name: String,
    kind: SpanKind,
    trace_context: TraceContext,
    start_time: DateTime<Utc>,
    started: Instant,
    state: Mutex<SpanState>,
    ended: AtomicBool,
    exporter: Arc<dyn SpanExporter>,
}

impl BasicSpan {
    pub(crate) fn start(
        name: impl Into<String>,
        kind: SpanKind,
        trace_context: TraceContext,
        attributes: Attributes,
        exporter: Arc<dyn SpanExporter>,
    ) -> Self {
        let span = Self {
            name: name.into(),
            kind,
            trace_context,
            start_time: Utc::now(),
            started: Instant::now(),
            state: Mutex::new(SpanState::default()),
            ended: AtomicBool::new(false),
            exporter,
        };
        span.set_attributes(attributes);
        span
    }

    /// Returns the elapsed time since the span started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl fmt::Debug for BasicSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicSpan")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("trace_context", &self.trace_context)
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

impl Span for BasicSpan {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SpanKind {
        self.kind
    }

    fn trace_context(&self) -> &TraceContext {
        &self.trace_context
    }

    fn set_attributes(&self, attributes: Attributes) {
        if self.is_ended() {
            return;
        }
        let mut state = self.state.lock();
        for (key, value) in attributes {
            match state.attributes.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => state.attributes.push((key, value)),
            }
        }
    }

    fn add_event(&self, name: &str, attributes: Attributes) {
        if self.is_ended() {
            return;
        }
        self.state.lock().events.push(SpanEvent {
            name: name.to_string(),
            timestamp: Utc::now(),
            attributes,
        });
    }

    fn record_error(&self, error: &dyn std::error::Error) {
        self.add_event(
            SpanEvent::EXCEPTION,
            vec![(SpanEvent::EXCEPTION_MESSAGE.to_string(), error.to_string().into())],
        );
    }

    fn set_status(&self, status: SpanStatus) {
        if self.is_ended() {
            return;
        }
        self.state.lock().status = status;
    }

    fn end(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let state = std::mem::take(&mut *self.state.lock());
        self.exporter.export(FinishedSpan {
            name: self.name.clone(),
            kind: self.kind,
            trace_context: self.trace_context.clone(),
            attributes: state.attributes,
            events: state.events,
            status: state.status,
            start_time: self.start_time,
            duration: self.started.elapsed(),
        });
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}

/// An ended span, as handed to a [`SpanExporter`].
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    name: String,
    kind: SpanKind,
    trace_context: TraceContext,
    attributes: Attributes,
    events: Vec<SpanEvent>,
    status: SpanStatus,
    start_time: DateTime<Utc>,
    duration: Duration,
}

impl FinishedSpan {
    /// Returns the span name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the span kind.
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    /// Returns the span's trace context.
    pub fn trace_context(&self) -> &TraceContext {
        &self.trace_context
    }

    /// Returns the span attributes.
    pub fn attributes(&self) -> &[(String, SpanValue)] {
        &self.attributes
    }

    /// Returns the value of one attribute.
    pub fn attribute(&self, key: &str) -> Option<&SpanValue> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the span events in the order they were added.
    pub fn events(&self) -> &[SpanEvent] {
        &self.events
    }

    /// Returns the messages of all recorded errors.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter(|e| e.name == SpanEvent::EXCEPTION).filter_map(|e| {
            e.attributes
                .iter()
                .find(|(k, _)| k == SpanEvent::EXCEPTION_MESSAGE)
                .and_then(|(_, v)| v.as_str())
        })
    }

    /// Returns the span status.
    pub fn status(&self) -> &SpanStatus {
        &self.status
    }

    /// Returns the wall-clock start time.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the span duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
