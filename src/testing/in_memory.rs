//! In-memory call store and span exporter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::tracing_support::{FinishedSpan, SpanExporter};
use crate::transport::{ApiCallRecord, CallStore, CallStorer, RecordStore};
use crate::Context;

/// A [`CallStore`] keeping committed records in memory.
///
/// ## Example
///
/// ```rust
/// use o11y::testing::InMemoryCallStore;
///
/// let store = InMemoryCallStore::new();
/// assert!(store.records().is_empty());
///
/// let broken = InMemoryCallStore::failing("database is down");
/// # let _ = broken;
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCallStore {
    records: Arc<Mutex<Vec<ApiCallRecord>>>,
    failure: Option<String>,
}

impl InMemoryCallStore {
    /// Creates a store whose commits succeed.
    pub fn new() -> Self {
        Self { records: Arc::default(), failure: None }
    }

    /// Creates a store whose commits fail with a persistence error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { records: Arc::default(), failure: Some(message.into()) }
    }

    /// Returns every committed record, oldest first.
    pub fn records(&self) -> Vec<ApiCallRecord> {
        self.records.lock().clone()
    }
}

impl Default for InMemoryCallStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStore for InMemoryCallStore {
    fn storer(&self) -> Box<dyn CallStorer> {
        let records = Arc::clone(&self.records);
        let failure = self.failure.clone();
        let store = RecordStore::new(Arc::new(
            move |record: ApiCallRecord, _cx: Context| -> BoxFuture<'static, Result<()>> {
                let outcome = match &failure {
                    Some(message) => Err(Error::persistence(message.clone())),
                    None => {
                        records.lock().push(record);
                        Ok(())
                    },
                };
                Box::pin(async move { outcome })
            },
        ));
        store.storer()
    }
}

/// A [`SpanExporter`] keeping finished spans in memory.
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    spans: Mutex<Vec<FinishedSpan>>,
    shutdown_calls: AtomicUsize,
    shutdown_failure: Option<String>,
}

impl InMemoryExporter {
    /// Creates an exporter whose shutdown succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an exporter whose shutdown fails with `message`.
    pub fn failing_shutdown(message: impl Into<String>) -> Self {
        Self { shutdown_failure: Some(message.into()), ..Self::default() }
    }

    /// Returns every exported span in the order they ended.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().clone()
    }

    /// Returns the number of times shutdown was called.
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::Relaxed)
    }
}

impl SpanExporter for InMemoryExporter {
    fn export(&self, span: FinishedSpan) {
        self.spans.lock().push(span);
    }

    fn shutdown(&self) -> Result<()> {
        self.shutdown_calls.fetch_add(1, Ordering::Relaxed);
        match &self.shutdown_failure {
            Some(message) => Err(Error::exporter_shutdown(message.clone())),
            None => Ok(()),
        }
    }
}
