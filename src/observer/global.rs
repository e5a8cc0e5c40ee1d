//! The process-wide default Observer.
//!
//! Code that has no [`Context`](crate::Context) at hand, typically bootstrap
//! and shutdown paths, reports through the default Observer. It is set at
//! most once: the first [`initialise`](super::initialise) with
//! `install_global` set wins, and later calls leave it alone. If nothing was
//! installed, the first use builds a bootstrap Observer that writes JSON
//! records at [`Level::Info`] and above to stderr.

use std::error::Error as StdError;
use std::sync::{Arc, OnceLock};

use super::state::{Observer, ObserverSetup};
use crate::config::ObserverConfig;
use crate::sink::JsonSink;
use crate::{Fields, Level, Severity};

static DEFAULT: OnceLock<Arc<Observer>> = OnceLock::new();

/// Installs `observer` as the process default.
///
/// Returns `false` if a default was already in place.
pub fn install(observer: Arc<Observer>) -> bool {
    DEFAULT.set(observer).is_ok()
}

/// Returns `true` once a default exists, installed or bootstrapped.
pub fn is_installed() -> bool {
    DEFAULT.get().is_some()
}

/// Returns the process default, building the bootstrap Observer on first use.
pub fn default_observer() -> Arc<Observer> {
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(bootstrap())))
}

fn bootstrap() -> Observer {
    let config = ObserverConfig::builder().level(Level::Info).build();
    let stderr = Arc::new(JsonSink::stderr(Level::Info));
    let setup = ObserverSetup::builder()
        .config(Arc::new(config))
        .out(stderr.clone())
        .err(stderr)
        .install_global(false)
        .build();

    // The bootstrap config has no trace endpoint, so building cannot fail.
    match Observer::from_setup(setup) {
        Ok(observer) => observer,
        Err(err) => unreachable_bootstrap(&err),
    }
}

#[cold]
fn unreachable_bootstrap(err: &crate::Error) -> ! {
    eprintln!("o11y: could not build bootstrap observer: {err}");
    std::process::exit(1)
}

/// Logs through the process default at [`Level::Error`].
#[track_caller]
pub fn error(msg: &str, err: &dyn StdError, severity: Severity, fields: Fields) {
    default_observer().error(msg, err, severity, fields);
}

/// Logs through the process default at [`Level::Fatal`] and exits with status 1.
#[track_caller]
pub fn fatal(msg: &str, err: &dyn StdError, fields: Fields) -> ! {
    default_observer().fatal(msg, err, fields)
}
