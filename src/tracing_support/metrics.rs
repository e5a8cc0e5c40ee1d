//! In-process registry of outbound call metrics.
//!
//! [`CallMetrics`] counts calls and accumulates latency per
//! `(path, method, status)` series. It is the ready-made sink for the
//! metrics decorator: hand [`CallMetrics::recorder`] to
//! [`TransportBuilder::with_metrics`](crate::transport::TransportBuilder::with_metrics).
//! Exporting the numbers (Prometheus or otherwise) is left to the host.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use http::Method;
use parking_lot::RwLock;

use crate::transport::MetricsRecorder;

/// Identifies one metrics series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallKey {
    /// The (masked) request path.
    pub path: String,
    /// The request method.
    pub method: String,
    /// The response status code.
    pub status: u16,
}

#[derive(Debug, Default)]
struct CallCounters {
    count: AtomicU64,
    latency_sum_ns: AtomicU64,
}

/// Call counters and latency sums, keyed by path, method and status.
///
/// Cloning is cheap; clones share the same counters.
///
/// ## Example
///
/// ```rust
/// use std::time::Instant;
/// use http::Method;
/// use o11y::tracing_support::CallMetrics;
///
/// let metrics = CallMetrics::new();
/// let record = metrics.recorder();
///
/// record(200, &Method::GET, "/users/{id}", Instant::now());
///
/// assert_eq!(metrics.total_calls(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallMetrics {
    series: Arc<RwLock<HashMap<CallKey, CallCounters>>>,
}

impl CallMetrics {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed call that started at `start`.
    pub fn record(&self, status: u16, method: &Method, path: &str, start: Instant) {
        self.record_duration(status, method, path, start.elapsed());
    }

    /// Records one completed call with a known duration.
    pub fn record_duration(&self, status: u16, method: &Method, path: &str, elapsed: Duration) {
        let key = CallKey { path: path.to_string(), method: method.to_string(), status };
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        let series = self.series.read();
        if let Some(counters) = series.get(&key) {
            counters.count.fetch_add(1, Ordering::Relaxed);
            counters.latency_sum_ns.fetch_add(nanos, Ordering::Relaxed);
            return;
        }
        drop(series);

        let mut series = self.series.write();
        let counters = series.entry(key).or_default();
        counters.count.fetch_add(1, Ordering::Relaxed);
        counters.latency_sum_ns.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Returns a [`MetricsRecorder`] that feeds this registry.
    pub fn recorder(&self) -> MetricsRecorder {
        let metrics = self.clone();
        Arc::new(move |status: u16, method: &Method, path: &str, start: Instant| {
            metrics.record(status, method, path, start)
        })
    }

    /// Returns the number of calls recorded across all series.
    pub fn total_calls(&self) -> u64 {
        self.series.read().values().map(|c| c.count.load(Ordering::Relaxed)).sum()
    }

    /// Returns a snapshot of every series, sorted by key.
    pub fn snapshot(&self) -> Vec<CallStats> {
        let mut stats: Vec<CallStats> = self
            .series
            .read()
            .iter()
            .map(|(key, counters)| CallStats {
                key: key.clone(),
                count: counters.count.load(Ordering::Relaxed),
                latency_sum_ns: counters.latency_sum_ns.load(Ordering::Relaxed),
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    /// Removes every series.
    pub fn reset(&self) {
        self.series.write().clear();
    }
}

/// A point-in-time view of one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStats {
    /// The series.
    pub key: CallKey,
    /// Number of calls.
    pub count: u64,
    /// Sum of call latencies in nanoseconds.
    pub latency_sum_ns: u64,
}

impl CallStats {
    /// Returns the mean latency, or zero for an empty series.
    pub fn latency_avg(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.latency_sum_ns / self.count)
    }
}
