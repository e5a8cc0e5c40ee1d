//! Log levels and error severities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Record level, ordered from most to least verbose.
///
/// The numeric values leave gaps so a host can slot custom levels between
/// the standard ones.
///
/// | Level     | Value | Label     |
/// |-----------|-------|-----------|
/// | `Develop` | -8    | `DEVELOP` |
/// | `Debug`   | -4    | `DEBUG`   |
/// | `Info`    | 0     | `INFO`    |
/// | `Notice`  | 2     | `NOTICE`  |
/// | `Warning` | 4     | `WARN`    |
/// | `Error`   | 8     | `ERR`     |
/// | `Fatal`   | 12    | `FATAL`   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
#[repr(i8)]
pub enum Level {
    /// Local development noise.
    Develop = -8,
    /// Diagnostic detail.
    Debug = -4,
    /// Routine events.
    #[default]
    Info = 0,
    /// Normal but significant events.
    Notice = 2,
    /// Something unexpected that was handled.
    Warning = 4,
    /// A failed operation.
    Error = 8,
    /// The process cannot continue.
    Fatal = 12,
}

impl Level {
    /// Returns the numeric value.
    pub fn as_i8(self) -> i8 {
        self as i8
    }

    /// Returns the label written to log records.
    pub fn label(self) -> &'static str {
        match self {
            Level::Develop => "DEVELOP",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Notice => "NOTICE",
            Level::Warning => "WARN",
            Level::Error => "ERR",
            Level::Fatal => "FATAL",
        }
    }

    /// Parses a level name leniently: unknown names map to [`Level::Debug`].
    ///
    /// ```rust
    /// use o11y::Level;
    ///
    /// assert_eq!(Level::parse_lenient("WARN"), Level::Warning);
    /// assert_eq!(Level::parse_lenient("verbose"), Level::Debug);
    /// ```
    pub fn parse_lenient(name: &str) -> Level {
        name.parse().unwrap_or(Level::Debug)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "develop" => Ok(Level::Develop),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "notice" => Ok(Level::Notice),
            "warning" | "warn" => Ok(Level::Warning),
            "error" | "err" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.label().to_string()
    }
}

impl From<String> for Level {
    fn from(s: String) -> Self {
        Level::parse_lenient(&s)
    }
}

/// How much an error matters to whoever is on call.
///
/// Attached to error records as the `severity` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Lowest,
    /// Can wait.
    Low,
    /// Should be looked at.
    Medium,
    /// Needs attention soon.
    High,
    /// Needs attention now.
    Highest,
}

impl Severity {
    /// Returns the lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Lowest => "lowest",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Highest => "highest",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
