//! The Observer value and its logging methods.

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{Configurator, ObserverConfig};
use crate::error::{Error, Result};
use crate::fields::names;
use crate::sink::{JsonSink, LogRecord, LogSink, SourceLocation};
use crate::tracing_support::{BasicTracer, Span, TraceContext, Tracer, TracingExporter};
use crate::{Fields, Level, Severity};

/// Everything [`initialise`](crate::observer::initialise) needs to build an Observer.
///
/// Every member except `config` is optional:
///
/// | Member           | Default                                              |
/// |------------------|------------------------------------------------------|
/// | `config`         | [`ObserverConfig::from_env`]                         |
/// | `out`            | JSON lines on stdout at the configured level         |
/// | `err`            | JSON lines on stderr at the configured level         |
/// | `tracer`         | [`BasicTracer`] exporting through [`TracingExporter`] |
/// | `fields`         | none                                                 |
/// | `install_global` | `true`                                               |
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use o11y::{fields, Level, ObserverConfig, ObserverSetup};
///
/// let setup = ObserverSetup::builder()
///     .config(Arc::new(ObserverConfig::builder().level(Level::Debug).build()))
///     .fields(fields!["service" => "billing"])
///     .install_global(false)
///     .build();
/// ```
#[derive(bon::Builder)]
pub struct ObserverSetup {
    /// Observer settings.
    #[builder(default = Arc::new(ObserverConfig::from_env()) as Arc<dyn Configurator>)]
    pub config: Arc<dyn Configurator>,

    /// Sink for records below [`Level::Error`].
    pub out: Option<Arc<dyn LogSink>>,

    /// Sink for records at [`Level::Error`] and above.
    pub err: Option<Arc<dyn LogSink>>,

    /// Tracer shut down by [`Observer::close`].
    pub tracer: Option<Arc<dyn Tracer>>,

    /// Fields present on every record.
    #[builder(default)]
    pub fields: Fields,

    /// Whether to install the Observer as the process default.
    #[builder(default = true)]
    pub install_global: bool,
}

impl Default for ObserverSetup {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone)]
pub(crate) struct SpanFrame {
    pub(crate) span: Arc<dyn Span>,
    /// The active trace context before this span was pushed.
    pub(crate) parent: Option<TraceContext>,
}

/// Request-scoped logging and tracing state.
///
/// An Observer never changes once built. Operations that "modify" it
/// ([`extend`](crate::observer::extend), [`span`](crate::observer::span),
/// [`reset`](crate::observer::reset), ...) return a new `Arc<Observer>` bound
/// into a new [`Context`](crate::Context), so holders of the previous one are
/// unaffected.
///
/// Logging methods are `#[track_caller]`: records carry the location of the
/// code that called them. A helper that wraps these methods should be
/// `#[track_caller]` too if records should point past it.
#[derive(Clone)]
pub struct Observer {
    config: Arc<dyn Configurator>,
    out: Arc<dyn LogSink>,
    err: Arc<dyn LogSink>,
    tracer: Arc<dyn Tracer>,
    stable: Fields,
    spans: Vec<SpanFrame>,
}

impl Observer {
    /// Builds an Observer from `setup`, filling in defaults.
    ///
    /// Fails with a configuration error if the trace endpoint is not a valid URL.
    pub(crate) fn from_setup(setup: ObserverSetup) -> Result<Self> {
        let config = setup.config;
        if let Some(endpoint) = config.trace_endpoint() {
            url::Url::parse(endpoint)?;
        }

        let level = config.log_level();
        let out = setup.out.unwrap_or_else(|| Arc::new(JsonSink::stdout(level)));
        let err = setup.err.unwrap_or_else(|| Arc::new(JsonSink::stderr(level)));
        let tracer = setup.tracer.unwrap_or_else(|| {
            Arc::new(BasicTracer::new(Arc::new(TracingExporter::new(config.service_name()))))
        });

        Ok(Self::from_parts(config, out, err, tracer, setup.fields))
    }

    pub(crate) fn from_parts(
        config: Arc<dyn Configurator>,
        out: Arc<dyn LogSink>,
        err: Arc<dyn LogSink>,
        tracer: Arc<dyn Tracer>,
        stable: Fields,
    ) -> Self {
        Self { config, out, err, tracer, stable, spans: Vec::new() }
    }

    /// The configuration this Observer was built with.
    pub fn config(&self) -> &dyn Configurator {
        self.config.as_ref()
    }

    /// The tracer [`close`](Self::close) shuts down.
    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Fields present on every record.
    pub fn fields(&self) -> &Fields {
        &self.stable
    }

    /// The current span, if any.
    pub fn current_span(&self) -> Option<&Arc<dyn Span>> {
        self.spans.last().map(|frame| &frame.span)
    }

    /// Number of stacked spans.
    pub fn span_depth(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn frames(&self) -> &[SpanFrame] {
        &self.spans
    }

    /// A copy with `fields` merged into the stable fields.
    pub(crate) fn with_fields(&self, fields: &Fields) -> Self {
        Self { stable: self.stable.merge(fields), ..self.clone() }
    }

    /// A copy with `span` pushed as the current span.
    pub(crate) fn with_span(&self, span: Arc<dyn Span>, parent: Option<TraceContext>) -> Self {
        let mut next = self.clone();
        next.spans.push(SpanFrame { span, parent });
        next
    }

    /// A copy with no stable fields and no spans, sharing sinks and tracer.
    pub(crate) fn fresh(&self) -> Self {
        Self { stable: Fields::new(), spans: Vec::new(), ..self.clone() }
    }

    /// Ends the current span and returns a copy with it popped.
    ///
    /// Also returns the trace context that was active before the span was
    /// pushed. An empty stack is a no-op.
    pub(crate) fn pop_span(&self) -> Option<(Self, Option<TraceContext>)> {
        let mut next = self.clone();
        let frame = next.spans.pop()?;
        frame.span.end();
        Some((next, frame.parent))
    }

    /// Ends the current span and returns the Observer with the previous span current.
    ///
    /// Prefer [`observer::end`](crate::observer::end), which also restores the
    /// context's active trace. An empty stack returns an unchanged copy.
    pub fn end(&self) -> Arc<Observer> {
        match self.pop_span() {
            Some((next, _)) => Arc::new(next),
            None => Arc::new(self.clone()),
        }
    }

    /// Ends every stacked span, newest first, then shuts down the tracer.
    ///
    /// Ending is idempotent, so spans already ended elsewhere are fine.
    pub fn try_close(&self) -> Result<()> {
        for frame in self.spans.iter().rev() {
            frame.span.end();
        }
        self.tracer
            .shutdown()
            .map_err(|err| Error::exporter_shutdown("could not shut down tracer").with_source(err))
    }

    /// Like [`try_close`](Self::try_close), but a shutdown failure is logged
    /// at [`Level::Fatal`] and terminates the process.
    #[track_caller]
    pub fn close(&self) {
        if let Err(err) = self.try_close() {
            self.fatal("could not shut down tracer", &err, Fields::new());
        }
    }

    /// Logs at [`Level::Develop`].
    #[track_caller]
    pub fn develop(&self, msg: &str, fields: Fields) {
        self.emit(Level::Develop, msg, fields, None, Location::caller());
    }

    /// Logs at [`Level::Debug`].
    #[track_caller]
    pub fn debug(&self, msg: &str, fields: Fields) {
        self.emit(Level::Debug, msg, fields, None, Location::caller());
    }

    /// Logs at [`Level::Info`].
    #[track_caller]
    pub fn info(&self, msg: &str, fields: Fields) {
        self.emit(Level::Info, msg, fields, None, Location::caller());
    }

    /// Logs at [`Level::Notice`].
    #[track_caller]
    pub fn notice(&self, msg: &str, fields: Fields) {
        self.emit(Level::Notice, msg, fields, None, Location::caller());
    }

    /// Logs at [`Level::Warning`].
    #[track_caller]
    pub fn warning(&self, msg: &str, fields: Fields) {
        self.emit(Level::Warning, msg, fields, None, Location::caller());
    }

    /// Alias for [`warning`](Self::warning).
    #[track_caller]
    pub fn warn(&self, msg: &str, fields: Fields) {
        self.emit(Level::Warning, msg, fields, None, Location::caller());
    }

    /// Logs a failed operation at [`Level::Error`] with `error` and `severity` fields.
    ///
    /// The current span, if any, records the error.
    #[track_caller]
    pub fn error(&self, msg: &str, err: &dyn StdError, severity: Severity, fields: Fields) {
        self.emit(Level::Error, msg, fields, Some((err, severity)), Location::caller());
    }

    /// Logs at [`Level::Fatal`] with severity `highest`, then exits the process with status 1.
    ///
    /// Reserved for bootstrap and shutdown failures.
    #[track_caller]
    pub fn fatal(&self, msg: &str, err: &dyn StdError, fields: Fields) -> ! {
        self.emit(Level::Fatal, msg, fields, Some((err, Severity::Highest)), Location::caller());
        std::process::exit(1)
    }

    /// Logs at an arbitrary level.
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, fields: Fields) {
        self.emit(level, msg, fields, None, Location::caller());
    }

    /// Returns `true` if a record at `level` would be written.
    pub fn enabled(&self, level: Level) -> bool {
        self.sink_for(level).enabled(level)
    }

    fn sink_for(&self, level: Level) -> &Arc<dyn LogSink> {
        if level >= Level::Error { &self.err } else { &self.out }
    }

    fn emit(
        &self,
        level: Level,
        msg: &str,
        fields: Fields,
        failure: Option<(&dyn StdError, Severity)>,
        location: &'static Location<'static>,
    ) {
        let sink = self.sink_for(level);
        if !sink.enabled(level) {
            return;
        }

        let mut fields = self.stable.merge(&fields);

        if let Some(span) = self.current_span() {
            span.set_attributes(fields.to_span_attributes());
            match failure {
                Some((err, _)) => span.record_error(err),
                None => span.add_event(msg, Vec::new()),
            }
        }

        if let Some((err, severity)) = failure {
            fields.insert(names::ERROR, err.to_string());
            fields.insert(names::SEVERITY, severity.as_str());
        }

        sink.write(&LogRecord {
            level,
            message: msg.to_string(),
            timestamp: (!self.config.omit_timestamps()).then(Utc::now),
            fields,
            source: Some(SourceLocation::from_location(location, self.config.trim_paths())),
        });
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("config", &self.config)
            .field("fields", &self.stable)
            .field("spans", &self.spans.iter().map(|f| f.span.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
