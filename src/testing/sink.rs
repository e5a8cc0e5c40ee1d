//! A log sink that keeps records in memory.

use parking_lot::Mutex;

use crate::sink::{LogRecord, LogSink};
use crate::Level;

/// Captures every enabled record for later assertions.
///
/// ## Example
///
/// ```rust
/// use o11y::testing::MemorySink;
/// use o11y::{Level, LogSink};
///
/// let sink = MemorySink::new(Level::Info);
/// assert!(sink.enabled(Level::Notice));
/// assert!(sink.records().is_empty());
/// ```
#[derive(Debug)]
pub struct MemorySink {
    level: Level,
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Creates a sink accepting records at `level` and above.
    pub fn new(level: Level) -> Self {
        Self { level, records: Mutex::new(Vec::new()) }
    }

    /// Returns every captured record, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Returns the most recent record.
    pub fn last(&self) -> Option<LogRecord> {
        self.records.lock().last().cloned()
    }

    /// Returns the messages of every captured record.
    pub fn messages(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Returns every record rendered as a JSON line.
    pub fn json_lines(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| serde_json::to_string(record).ok())
            .collect()
    }

    /// Discards captured records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(Level::Develop)
    }
}

impl LogSink for MemorySink {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    fn write(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}
