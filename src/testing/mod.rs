//! Test doubles for code that uses o11y.
//!
//! - [`TestObserver`] / [`test_observer`]: an Observer wired to in-memory sinks
//! - [`MemorySink`]: captures log records
//! - [`MockTransport`]: canned responses, records requests
//! - [`InMemoryCallStore`]: captures persisted calls
//! - [`InMemoryExporter`]: captures ended spans
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use o11y::testing::{test_observer, MockTransport};
//! use o11y::transport::{HttpRequest, RoundTrip, TransportBuilder};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> o11y::Result<()> {
//! let test = test_observer();
//! let mock = Arc::new(MockTransport::new());
//! let transport = TransportBuilder::new(&test.cx, mock.clone()).with_logging()?.build();
//!
//! let url = url::Url::parse("http://svc.internal/ping")?;
//! transport.round_trip(HttpRequest::get(url).with_context(test.cx.clone())).await?;
//!
//! assert_eq!(mock.request_count(), 1);
//! assert!(test.out.messages().contains(&"outbound call - response".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! | Double               | Replaces                         |
//! |----------------------|----------------------------------|
//! | `MemorySink`         | `JsonSink` / `TracingSink`       |
//! | `MockTransport`      | `RestTransport`                  |
//! | `InMemoryCallStore`  | a database-backed `CallStore`    |
//! | `InMemoryExporter`   | `TracingExporter`                |

mod in_memory;
mod mock_transport;
mod observer;
mod sink;

pub use in_memory::{InMemoryCallStore, InMemoryExporter};
pub use mock_transport::{MockTransport, RecordedRequest};
pub use observer::{test_observer, TestObserver};
pub use sink::MemorySink;
