//! Observer wiring for tests.

use std::sync::Arc;

use super::{InMemoryExporter, MemorySink};
use crate::config::ObserverConfig;
use crate::observer::{self, Observer};
use crate::tracing_support::{BasicTracer, Tracer};
use crate::{Context, Fields, Level};

/// An Observer bound into a context, with its sinks and exporter exposed.
///
/// Timestamps are omitted, both sinks capture in memory and spans are
/// exported to an [`InMemoryExporter`]. The Observer is never installed as
/// the process default.
///
/// ## Example
///
/// ```rust
/// use o11y::testing::test_observer;
/// use o11y::fields;
///
/// let test = test_observer();
/// test.observer().info("charged", fields!["amount" => 10]);
///
/// let record = test.out.last().unwrap();
/// assert_eq!(record.message, "charged");
/// assert!(record.timestamp.is_none());
/// ```
#[derive(Debug)]
pub struct TestObserver {
    /// Context carrying the Observer.
    pub cx: Context,
    /// Sink for records below [`Level::Error`].
    pub out: Arc<MemorySink>,
    /// Sink for records at [`Level::Error`] and above.
    pub err: Arc<MemorySink>,
    /// Exporter receiving ended spans.
    pub exporter: Arc<InMemoryExporter>,
    /// Tracer feeding `exporter`.
    pub tracer: Arc<dyn Tracer>,
    observer: Arc<Observer>,
}

impl TestObserver {
    /// Captures every level.
    #[track_caller]
    pub fn new() -> Self {
        Self::with_level(Level::Develop)
    }

    /// Captures records at `level` and above.
    #[track_caller]
    pub fn with_level(level: Level) -> Self {
        Self::build(level, InMemoryExporter::new())
    }

    /// Like [`new`](Self::new), with an exporter whose shutdown fails.
    #[track_caller]
    pub fn with_failing_exporter(message: impl Into<String>) -> Self {
        Self::build(Level::Develop, InMemoryExporter::failing_shutdown(message))
    }

    #[track_caller]
    fn build(level: Level, exporter: InMemoryExporter) -> Self {
        let config = ObserverConfig::builder()
            .level(level)
            .service_name("test")
            .omit_timestamps(true)
            .build();
        let out = Arc::new(MemorySink::new(level));
        let err = Arc::new(MemorySink::new(level));
        let exporter = Arc::new(exporter);
        let tracer: Arc<dyn Tracer> = Arc::new(BasicTracer::new(exporter.clone()));

        let observer = Observer::from_parts(
            Arc::new(config),
            out.clone(),
            err.clone(),
            Arc::clone(&tracer),
            Fields::new(),
        );
        let (cx, observer) = observer::bind(&Context::new(), observer, false);

        Self { cx, out, err, exporter, tracer, observer }
    }

    /// The Observer as initialised.
    pub fn observer(&self) -> Arc<Observer> {
        Arc::clone(&self.observer)
    }
}

impl Default for TestObserver {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for [`TestObserver::new`].
#[track_caller]
pub fn test_observer() -> TestObserver {
    TestObserver::new()
}
