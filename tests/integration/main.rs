//! Integration tests for o11y.
//!
//! Everything here runs in-process: Observers write to in-memory sinks,
//! outbound calls go to a [`MockTransport`](o11y::testing::MockTransport)
//! or a local wiremock server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration
//!
//! # Run a specific test
//! cargo test --test integration test_full_chain_against_wiremock -- --nocapture
//! ```

#[cfg(feature = "tower")]
mod inbound_tests;
mod observer_tests;
mod redaction_tests;
#[cfg(feature = "rest")]
mod rest_tests;
mod tracing_tests;
mod transport_tests;
