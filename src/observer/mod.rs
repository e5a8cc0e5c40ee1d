//! The Observer: request-scoped structured logging with a span stack.
//!
//! An [`Observer`] travels inside a [`Context`](crate::Context). Handlers
//! fetch it with [`get`], attach request-scoped fields with [`extend`], open
//! spans with [`span`] and close them with [`end`]. Each of these returns a
//! new context and Observer, so concurrent requests never see each other's
//! fields or spans.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use o11y::observer::{self, ObserverSetup};
//! use o11y::tracing_support::SpanKind;
//! use o11y::{fields, Context, ObserverConfig};
//!
//! # fn main() -> o11y::Result<()> {
//! let setup = ObserverSetup::builder()
//!     .config(Arc::new(ObserverConfig::default()))
//!     .install_global(false)
//!     .build();
//! let (cx, obs) = observer::initialise(&Context::new(), setup)?;
//!
//! let (cx, obs) = observer::extend(&cx, fields!["tenant" => "acme"])?;
//! let (cx, obs) = observer::span(&cx, obs.tracer().as_ref(), "load-invoice", SpanKind::Internal)?;
//! obs.info("loaded", fields!["invoice" => 42]);
//!
//! let (_cx, obs) = observer::end(&cx)?;
//! obs.try_close()?;
//! # Ok(())
//! # }
//! ```

pub mod global;
mod ops;
mod state;

pub(crate) use ops::bind;
pub use ops::{add_to_context, end, expand, extend, get, in_context, initialise, reset, span};
pub use state::{Observer, ObserverSetup};
