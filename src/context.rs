//! The request-scoped context carried through a call chain.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::tracing_support::TraceContext;

/// An immutable, type-keyed bag of request-scoped values.
///
/// Each `with_*` call returns a new `Context` and leaves the original
/// untouched, so a context can be handed to concurrent tasks without any of
/// them observing the others' additions. At most one value per type is held;
/// wrap values in a newtype to avoid collisions.
///
/// The crate stores three things here: the Observer, the active
/// [`TraceContext`] and the inbound [`RequestId`].
///
/// ## Example
///
/// ```rust
/// use o11y::Context;
///
/// #[derive(Debug, PartialEq)]
/// struct Tenant(&'static str);
///
/// let base = Context::new();
/// let scoped = base.with_value(Tenant("acme"));
///
/// assert_eq!(scoped.get::<Tenant>(), Some(&Tenant("acme")));
/// assert!(base.get::<Tenant>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this context holding `value`, replacing any previous value of type `T`.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        self.with_arc(Arc::new(value))
    }

    /// Like [`with_value`](Self::with_value) for an already shared value.
    #[must_use]
    pub fn with_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.values).insert(TypeId::of::<T>(), value);
        next
    }

    /// Returns a copy of this context without a value of type `T`.
    #[must_use]
    pub fn without<T: Any + Send + Sync>(&self) -> Self {
        if !self.contains::<T>() {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.values).remove(&TypeId::of::<T>());
        next
    }

    /// Borrows the value of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>()).and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns a shared handle to the value of type `T`.
    pub fn get_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values.get(&TypeId::of::<T>()).cloned().and_then(|value| value.downcast::<T>().ok())
    }

    /// Returns `true` if a value of type `T` is present.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of values held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the context holds nothing.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The active trace context: the current span, or the remote parent of an inbound request.
    pub fn trace_context(&self) -> Option<&TraceContext> {
        self.get::<TraceContext>()
    }

    /// Returns a copy with `trace_context` as the active trace context.
    #[must_use]
    pub fn with_trace_context(&self, trace_context: TraceContext) -> Self {
        self.with_value(trace_context)
    }

    /// The id assigned to the inbound request, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.get::<RequestId>().map(RequestId::as_str)
    }

    /// Returns a copy carrying `request_id`.
    #[must_use]
    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        self.with_value(RequestId(request_id.into()))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values.len())
            .field("trace_context", &self.trace_context())
            .field("request_id", &self.request_id())
            .finish()
    }
}

/// Identifier assigned to an inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generates a random (v4 UUID) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
