//! # o11y
//!
//! Request-scoped observability for Rust services.
//!
//! An [`Observer`] travels inside a [`Context`] and carries everything a log
//! line needs: the level filter, the output sinks, the tracer, a set of
//! stable fields and a stack of open spans. Every operation returns a new
//! context; the one you started from is never modified.
//!
//! ## Quick Start
//!
//! ```rust
//! use o11y::prelude::*;
//! use o11y::fields;
//!
//! # fn main() -> o11y::Result<()> {
//! let config = ObserverConfig::builder().service_name("billing").build();
//! let setup = ObserverSetup::builder()
//!     .config(std::sync::Arc::new(config))
//!     .install_global(false)
//!     .build();
//!
//! let (cx, _obs) = observer::initialise(&Context::new(), setup)?;
//! let (cx, obs) = observer::extend(&cx, fields!["customer_id" => "cus_42"])?;
//! obs.info("invoice created", fields!["amount" => 1200]);
//!
//! let (cx, obs) = observer::span(&cx, obs.tracer().as_ref(), "charge", SpanKind::Internal)?;
//! obs.debug("charging card", fields![]);
//! let (_cx, _obs) = observer::end(&cx)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - **Copy-on-write**: `extend`, `span`, `end` and `reset` hand back a new
//!   context and leave their input untouched
//! - **Stable fields**: merged into every record, newest value wins
//! - **Span annotation**: records logged while a span is open become span
//!   events; errors are recorded on the span
//! - **Redaction**: outbound headers and JSON bodies pass through
//!   [`redact`] before they are logged or stored
//! - **Transports**: decorators around [`transport::RoundTrip`] add logging,
//!   propagation, metrics and storage to outbound calls
//!
//! ## Features
//!
//! - `rest` (default): terminal transport via reqwest
//! - `rustls` (default): use rustls for TLS
//! - `native-tls`: use the platform TLS stack
//! - `tower` (default): inbound request middleware

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Core modules
pub mod config;
pub mod context;
pub mod error;
pub mod fields;
pub mod level;
pub mod observer;
pub mod redact;
pub mod sink;

// Tracing support
pub mod tracing_support;

// Outbound transports
pub mod transport;

// Inbound middleware
#[cfg(feature = "tower")]
#[cfg_attr(docsrs, doc(cfg(feature = "tower")))]
pub mod inbound;

// Testing utilities
pub mod testing;

// Prelude for convenient imports
pub mod prelude;

// Re-export main types at crate root for convenience
pub use config::{Configurator, ObserverConfig};
pub use context::{Context, RequestId};
pub use error::{Error, ErrorKind, Result};
pub use fields::Fields;
pub use level::{Level, Severity};
pub use observer::{Observer, ObserverSetup};
pub use sink::{LogRecord, LogSink};

#[doc(hidden)]
pub mod __private {
    pub use serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_compiles() {
        let _ = ErrorKind::ObserverNotFound;
        assert!(Level::Error > Level::Info);
    }
}
