//! Decorator chain composition.

use std::sync::Arc;

use super::logging::LoggingTransport;
use super::metrics::{MetricsRecorder, MetricsTransport, PathMask};
use super::propagation::PropagationTransport;
use super::storage::{CallStore, StorageTransport};
use super::client_span::TracingTransport;
use super::traits::RoundTrip;
use crate::error::Result;
use crate::observer;
use crate::tracing_support::{Propagator, Tracer, W3CTraceContext};
use crate::Context;

/// Builds a decorated transport.
///
/// Each `with_*` call wraps everything added so far, so the decorator added
/// last runs first on the way out and last on the way back. Building never
/// mutates a shared transport; every builder step returns a new chain.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use o11y::observer::{self, ObserverSetup};
/// use o11y::tracing_support::CallMetrics;
/// use o11y::transport::{RoundTrip, TransportBuilder};
/// use o11y::testing::MockTransport;
/// use o11y::Context;
///
/// # fn main() -> o11y::Result<()> {
/// let (cx, _) = observer::initialise(
///     &Context::new(),
///     ObserverSetup::builder().install_global(false).build(),
/// )?;
/// let metrics = CallMetrics::new();
///
/// // Requests go: logging -> metrics -> propagation -> mock.
/// let transport: Arc<dyn RoundTrip> = TransportBuilder::new(&cx, Arc::new(MockTransport::new()))
///     .with_propagation()
///     .with_metrics(metrics.recorder(), None)
///     .with_logging()?
///     .build();
/// # let _ = transport;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TransportBuilder {
    cx: Context,
    chain: Arc<dyn RoundTrip>,
}

impl TransportBuilder {
    /// Starts a chain around `terminal`.
    ///
    /// `cx` supplies the Observer used by [`with_logging`](Self::with_logging)
    /// and [`with_storage`](Self::with_storage) for requests whose own
    /// context carries none.
    pub fn new(cx: &Context, terminal: Arc<dyn RoundTrip>) -> Self {
        Self { cx: cx.clone(), chain: terminal }
    }

    /// Starts a chain around a default [`RestTransport`](super::RestTransport).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be created.
    #[cfg(feature = "rest")]
    pub fn rest(cx: &Context) -> Result<Self> {
        Ok(Self::new(cx, Arc::new(super::RestTransport::new()?)))
    }

    /// Adds request/response logging.
    ///
    /// # Errors
    ///
    /// Returns an observer-not-found error if the builder's context carries
    /// no Observer.
    pub fn with_logging(self) -> Result<Self> {
        let observer = observer::get(&self.cx)?;
        let chain = Arc::new(LoggingTransport::new(self.chain, observer));
        Ok(Self { cx: self.cx, chain })
    }

    /// Adds W3C trace context injection.
    pub fn with_propagation(self) -> Self {
        self.with_propagator(W3CTraceContext)
    }

    /// Adds trace context injection in `propagator`'s format.
    pub fn with_propagator<P>(self, propagator: P) -> Self
    where
        P: Propagator + std::fmt::Debug + 'static,
    {
        let chain = Arc::new(PropagationTransport::new(self.chain, propagator));
        Self { cx: self.cx, chain }
    }

    /// Adds call metrics.
    pub fn with_metrics(self, recorder: MetricsRecorder, path_mask: Option<PathMask>) -> Self {
        let chain = Arc::new(MetricsTransport::new(self.chain, recorder, path_mask));
        Self { cx: self.cx, chain }
    }

    /// Adds a client span per call, started on the Observer's tracer.
    ///
    /// Apply after [`with_propagation`](Self::with_propagation) so the
    /// injected headers carry the client span.
    ///
    /// # Errors
    ///
    /// Returns an observer-not-found error if the builder's context carries
    /// no Observer.
    pub fn with_tracing(self) -> Result<Self> {
        let tracer = Arc::clone(observer::get(&self.cx)?.tracer());
        Ok(self.with_tracer(tracer))
    }

    /// Adds a client span per call, started on `tracer`.
    pub fn with_tracer(self, tracer: Arc<dyn Tracer>) -> Self {
        let chain = Arc::new(TracingTransport::new(self.chain, tracer));
        Self { cx: self.cx, chain }
    }

    /// Adds call persistence.
    ///
    /// # Errors
    ///
    /// Returns an observer-not-found error if the builder's context carries
    /// no Observer.
    pub fn with_storage(self, store: Arc<dyn CallStore>) -> Result<Self> {
        let observer = observer::get(&self.cx)?;
        let chain = Arc::new(StorageTransport::new(self.chain, store, observer));
        Ok(Self { cx: self.cx, chain })
    }

    /// Returns the composed transport.
    pub fn build(self) -> Arc<dyn RoundTrip> {
        self.chain
    }
}
