//! Log records and the sinks that write them.
//!
//! An Observer owns two sinks: `out` for records below [`Level::Error`] and
//! `err` for the rest. They may point at the same destination.

use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{Fields, Level};

/// Where a record was emitted from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceLocation {
    /// Source file, with configured prefixes trimmed.
    pub file: String,
    /// Line number.
    pub line: u32,
}

impl SourceLocation {
    /// Captures a [`std::panic::Location`], stripping the first matching prefix.
    pub fn from_location(location: &std::panic::Location<'_>, trim_paths: &[String]) -> Self {
        let file = location.file();
        let file = trim_paths
            .iter()
            .find_map(|prefix| file.strip_prefix(prefix.as_str()))
            .unwrap_or(file);
        Self { file: file.to_string(), line: location.line() }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

const RESERVED_KEYS: [&str; 4] = ["time", "level", "source", "msg"];
const RESERVED_PREFIX: &str = "fields.";

/// One structured log record.
///
/// Serializes as a flat JSON object: `time` (omitted when `None`), `level`,
/// `source`, `msg`, then every field in order. A field named like one of the
/// record keys is written as `fields.<name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Record level.
    pub level: Level,
    /// Message.
    pub message: String,
    /// UTC timestamp, or `None` when timestamps are disabled.
    pub timestamp: Option<DateTime<Utc>>,
    /// Stable fields merged with call-site fields.
    pub fields: Fields,
    /// Emitting call site.
    pub source: Option<SourceLocation>,
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(timestamp) = &self.timestamp {
            map.serialize_entry("time", &timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))?;
        }
        map.serialize_entry("level", self.level.label())?;
        if let Some(source) = &self.source {
            map.serialize_entry("source", source)?;
        }
        map.serialize_entry("msg", &self.message)?;
        for (key, value) in self.fields.iter() {
            if RESERVED_KEYS.contains(&key) {
                map.serialize_entry(&format!("{RESERVED_PREFIX}{key}"), value)?;
            } else {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// A log destination.
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Returns `true` if records at `level` would be written.
    fn enabled(&self, level: Level) -> bool;

    /// Writes one record. Filtering on [`enabled`](Self::enabled) is the caller's job.
    fn write(&self, record: &LogRecord);
}

/// Writes records as JSON lines.
///
/// ## Example
///
/// ```rust
/// use o11y::{Level, LogSink};
/// use o11y::sink::JsonSink;
///
/// let sink = JsonSink::new(Vec::new(), Level::Info);
/// assert!(sink.enabled(Level::Warning));
/// assert!(!sink.enabled(Level::Debug));
/// ```
pub struct JsonSink<W> {
    writer: Mutex<W>,
    level: Level,
}

impl<W: Write + Send> JsonSink<W> {
    /// Creates a sink writing records at `level` and above to `writer`.
    pub fn new(writer: W, level: Level) -> Self {
        Self { writer: Mutex::new(writer), level }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonSink<io::Stdout> {
    /// A sink on standard output.
    pub fn stdout(level: Level) -> Self {
        Self::new(io::stdout(), level)
    }
}

impl JsonSink<io::Stderr> {
    /// A sink on standard error.
    pub fn stderr(level: Level) -> Self {
        Self::new(io::stderr(), level)
    }
}

impl<W> fmt::Debug for JsonSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSink").field("level", &self.level).finish_non_exhaustive()
    }
}

impl<W: Write + Send> LogSink for JsonSink<W> {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    fn write(&self, record: &LogRecord) {
        let line = match serde_json::to_vec(record) {
            Ok(mut line) => {
                line.push(b'\n');
                line
            },
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize log record");
                return;
            },
        };

        let mut writer = self.writer.lock();
        if let Err(err) = writer.write_all(&line).and_then(|()| writer.flush()) {
            tracing::warn!(error = %err, "failed to write log record");
        }
    }
}

/// Forwards records to the `tracing` ecosystem as events on the `o11y` target.
///
/// Fields travel as one JSON-encoded `fields` value.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    level: Level,
}

impl TracingSink {
    /// Creates a sink forwarding records at `level` and above.
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl LogSink for TracingSink {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    fn write(&self, record: &LogRecord) {
        let fields = serde_json::to_string(&record.fields).unwrap_or_default();
        let source = record.source.as_ref().map(ToString::to_string).unwrap_or_default();
        let label = record.level.label();
        let message = record.message.as_str();

        match record.level {
            Level::Develop => {
                tracing::trace!(target: "o11y", record_level = label, %source, %fields, "{message}")
            },
            Level::Debug => {
                tracing::debug!(target: "o11y", record_level = label, %source, %fields, "{message}")
            },
            Level::Info | Level::Notice => {
                tracing::info!(target: "o11y", record_level = label, %source, %fields, "{message}")
            },
            Level::Warning => {
                tracing::warn!(target: "o11y", record_level = label, %source, %fields, "{message}")
            },
            Level::Error | Level::Fatal => {
                tracing::error!(target: "o11y", record_level = label, %source, %fields, "{message}")
            },
        }
    }
}
