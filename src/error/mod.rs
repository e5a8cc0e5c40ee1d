//! Error types for the o11y crate.
//!
//! One error type, [`Error`], carries an [`ErrorKind`] for matching, a
//! human-readable message and an optional source.
//!
//! ## Which failures surface
//!
//! | Failure                         | Surfaced as                               |
//! |---------------------------------|-------------------------------------------|
//! | No Observer bound to a context  | `Err(ErrorKind::ObserverNotFound)`        |
//! | Malformed JSON body on redaction| never; the body passes through unchanged  |
//! | Inner transport failure         | propagated unchanged through decorators   |
//! | Call record could not be stored | logged at error level **and** returned    |
//! | Span exporter shutdown failure  | `try_close` returns it, `close` exits     |

mod core;
mod kind;

pub use core::Error;
pub use kind::ErrorKind;

/// A specialized `Result` type for o11y operations.
pub type Result<T> = std::result::Result<T, Error>;
