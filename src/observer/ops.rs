//! Context-level Observer operations.
//!
//! Every operation that derives a new Observer binds it into a new
//! [`Context`] and returns both, leaving the input context untouched.

use std::sync::Arc;

use super::global;
use super::state::{Observer, ObserverSetup};
use crate::error::{Error, Result};
use crate::tracing_support::{SpanKind, TraceContext, Tracer};
use crate::{Context, Fields};

/// Builds an Observer from `setup` and binds it into a copy of `cx`.
///
/// When `setup.install_global` is set and no process default exists yet,
/// the Observer also becomes the process default used by
/// [`global::fatal`] and [`global::error`]. Emits one debug record.
///
/// # Errors
///
/// Returns a configuration error if the configured trace endpoint is not a
/// valid URL.
#[track_caller]
pub fn initialise(cx: &Context, setup: ObserverSetup) -> Result<(Context, Arc<Observer>)> {
    let install = setup.install_global;
    let observer = Observer::from_setup(setup)?;
    Ok(bind(cx, observer, install))
}

#[track_caller]
pub(crate) fn bind(cx: &Context, observer: Observer, install: bool) -> (Context, Arc<Observer>) {
    let observer = Arc::new(observer);
    if install {
        global::install(Arc::clone(&observer));
    }

    observer.debug("observer initialised", Fields::new());
    (add_to_context(cx, Arc::clone(&observer)), observer)
}

/// Returns the Observer bound into `cx`.
///
/// # Errors
///
/// Returns [`ErrorKind::ObserverNotFound`](crate::ErrorKind::ObserverNotFound)
/// if `cx` carries none.
pub fn get(cx: &Context) -> Result<Arc<Observer>> {
    cx.get_arc::<Observer>().ok_or_else(Error::observer_not_found)
}

/// Returns `true` if `cx` carries an Observer.
pub fn in_context(cx: &Context) -> bool {
    cx.contains::<Observer>()
}

/// Binds `observer` into a copy of `cx`, replacing any existing one.
pub fn add_to_context(cx: &Context, observer: Arc<Observer>) -> Context {
    cx.with_arc(observer)
}

/// Merges `fields` into the stable fields of the Observer in `cx`.
///
/// Keys already present take the new value.
///
/// # Errors
///
/// Returns an observer-not-found error if `cx` carries no Observer.
pub fn extend(cx: &Context, fields: Fields) -> Result<(Context, Arc<Observer>)> {
    let observer = Arc::new(get(cx)?.with_fields(&fields));
    Ok((add_to_context(cx, Arc::clone(&observer)), observer))
}

/// Starts a span named `name` and pushes it as the current span.
///
/// The parent is the context's active trace, which may be a remote parent
/// extracted from an inbound request. The returned context's active trace
/// is the new span.
///
/// # Errors
///
/// Returns an observer-not-found error if `cx` carries no Observer.
pub fn span(
    cx: &Context,
    tracer: &dyn Tracer,
    name: &str,
    kind: SpanKind,
) -> Result<(Context, Arc<Observer>)> {
    let observer = get(cx)?;
    let parent = cx.trace_context().cloned();
    let span = tracer.start(parent.as_ref(), name, kind, observer.fields().to_span_attributes());
    let trace_context = span.trace_context().clone();

    let observer = Arc::new(observer.with_span(span, parent));
    let cx = add_to_context(cx, Arc::clone(&observer)).with_trace_context(trace_context);
    Ok((cx, observer))
}

/// [`span`] followed by [`extend`].
///
/// The new span starts with the current stable fields as attributes; `fields`
/// reach it once a record is logged.
///
/// # Errors
///
/// Returns an observer-not-found error if `cx` carries no Observer.
pub fn expand(
    cx: &Context,
    tracer: &dyn Tracer,
    name: &str,
    kind: SpanKind,
    fields: Fields,
) -> Result<(Context, Arc<Observer>)> {
    let (cx, _) = span(cx, tracer, name, kind)?;
    extend(&cx, fields)
}

/// Ends the current span and makes the previous one current again.
///
/// The returned context's active trace goes back to what it was before the
/// span was pushed. With no spans stacked this returns `cx` unchanged.
///
/// # Errors
///
/// Returns an observer-not-found error if `cx` carries no Observer.
pub fn end(cx: &Context) -> Result<(Context, Arc<Observer>)> {
    let observer = get(cx)?;
    let Some((next, parent)) = observer.pop_span() else {
        return Ok((cx.clone(), observer));
    };

    let next = Arc::new(next);
    let cx = add_to_context(cx, Arc::clone(&next));
    let cx = match parent {
        Some(parent) => cx.with_trace_context(parent),
        None => cx.without::<TraceContext>(),
    };
    Ok((cx, next))
}

/// Replaces the Observer in `cx` with one that has no stable fields and no
/// spans, sharing the original's sinks and tracer.
///
/// Stacked spans are dropped without being ended and the active trace goes
/// back to what it was before the first of them was pushed. Emits one debug
/// record. A context without an Observer is returned unchanged.
#[track_caller]
pub fn reset(cx: &Context) -> Context {
    let Ok(observer) = get(cx) else {
        return cx.clone();
    };

    let restored = observer.frames().first().map(|frame| frame.parent.clone());
    let fresh = Arc::new(observer.fresh());
    fresh.debug("observer reset", Fields::new());

    let cx = add_to_context(cx, fresh);
    match restored {
        Some(Some(parent)) => cx.with_trace_context(parent),
        Some(None) => cx.without::<TraceContext>(),
        None => cx,
    }
}
