//! Observer configuration.
//!
//! The Observer reads its settings through the [`Configurator`] trait, so a
//! host can plug in its own configuration type. [`ObserverConfig`] is the
//! provided implementation, built either with its builder or from the
//! environment.
//!
//! ## Environment
//!
//! | Variable       | Setting                                    | Default     |
//! |----------------|--------------------------------------------|-------------|
//! | `LOG_LEVEL`    | minimum record level (unknown → `debug`)   | `info`      |
//! | `OTEL_URL`     | trace collector endpoint; enables server spans | unset   |
//! | `DATABASE_URL` | call-record storage                        | unset       |
//! | `SERVICE_NAME` | service name on exported spans             | `service`   |
//! | `TRIM_PATHS`   | comma-separated source path prefixes to trim | none      |
//! | `ENV`          | `test` omits timestamps from records       | unset       |
//!
//! ## Example
//!
//! ```rust
//! use o11y::{Level, ObserverConfig};
//!
//! let config = ObserverConfig::builder()
//!     .level(Level::Debug)
//!     .service_name("billing")
//!     .build();
//! assert_eq!(config.service_name, "billing");
//! ```

use std::fmt;

use crate::Level;

/// Settings the Observer needs.
pub trait Configurator: Send + Sync + fmt::Debug {
    /// Minimum level written by the default sinks.
    fn log_level(&self) -> Level;

    /// Trace collector endpoint. When set, the inbound layer opens a server span per request.
    fn trace_endpoint(&self) -> Option<&str>;

    /// Connection string for call-record storage.
    fn database_url(&self) -> Option<&str>;

    /// Service name attached to exported spans.
    fn service_name(&self) -> &str;

    /// Source path prefixes stripped from record locations.
    fn trim_paths(&self) -> &[String];

    /// Whether records omit their timestamp, for deterministic test output.
    fn omit_timestamps(&self) -> bool;
}

/// The provided [`Configurator`].
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct ObserverConfig {
    /// Minimum record level.
    #[builder(default)]
    pub level: Level,

    /// Trace collector endpoint.
    #[builder(into)]
    pub trace_endpoint: Option<String>,

    /// Call-record storage connection string.
    #[builder(into)]
    pub database_url: Option<String>,

    /// Service name on exported spans.
    #[builder(into, default = "service".to_string())]
    pub service_name: String,

    /// Source path prefixes to trim.
    #[builder(default)]
    pub trim_paths: Vec<String>,

    /// Omit timestamps from records.
    #[builder(default)]
    pub omit_timestamps: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ObserverConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Empty values count as unset.
    ///
    /// ```rust
    /// use o11y::{Level, ObserverConfig};
    ///
    /// let config = ObserverConfig::from_lookup(|name| match name {
    ///     "LOG_LEVEL" => Some("notice".to_string()),
    ///     "ENV" => Some("test".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.level, Level::Notice);
    /// assert!(config.omit_timestamps);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            level: get("LOG_LEVEL").map_or(Level::Info, |v| Level::parse_lenient(&v)),
            trace_endpoint: get("OTEL_URL"),
            database_url: get("DATABASE_URL"),
            service_name: get("SERVICE_NAME").unwrap_or_else(|| "service".to_string()),
            trim_paths: get("TRIM_PATHS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            omit_timestamps: get("ENV").is_some_and(|v| v.eq_ignore_ascii_case("test")),
        }
    }
}

impl Configurator for ObserverConfig {
    fn log_level(&self) -> Level {
        self.level
    }

    fn trace_endpoint(&self) -> Option<&str> {
        self.trace_endpoint.as_deref()
    }

    fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn trim_paths(&self) -> &[String] {
        &self.trim_paths
    }

    fn omit_timestamps(&self) -> bool {
        self.omit_timestamps
    }
}
