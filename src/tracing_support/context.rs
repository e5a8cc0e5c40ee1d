//! Trace context for distributed tracing.

use std::fmt;

/// The identity of a span within a distributed trace, following W3C Trace Context.
///
/// A `TraceContext` is what travels between services (in `traceparent` / `b3`
/// headers) and what the Observer records as the *active* trace in a
/// [`Context`](crate::Context), so that the next span started becomes its child.
///
/// ## Example
///
/// ```rust
/// use o11y::tracing_support::TraceContext;
///
/// let root = TraceContext::new_root();
/// let child = root.child();
///
/// assert_eq!(child.trace_id(), root.trace_id());
/// assert_eq!(child.parent_span_id(), Some(root.span_id()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    flags: TraceFlags,
    tracestate: Option<String>,
    remote: bool,
}

impl TraceContext {
    /// Creates a new sampled root trace context with random IDs.
    pub fn new_root() -> Self {
        Self::new(TraceId::random(), SpanId::random())
    }

    /// Creates a sampled trace context with the given IDs.
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            flags: TraceFlags::SAMPLED,
            tracestate: None,
            remote: false,
        }
    }

    /// Creates a child context: same trace, fresh span ID, this span as parent.
    ///
    /// The child is always local, even when `self` was extracted from headers.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id.clone()),
            flags: self.flags,
            tracestate: self.tracestate.clone(),
            remote: false,
        }
    }

    /// Parses a W3C `traceparent` header value.
    ///
    /// The result is marked as remote.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use o11y::tracing_support::TraceContext;
    ///
    /// let ctx = TraceContext::from_traceparent(
    ///     "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
    /// ).unwrap();
    ///
    /// assert_eq!(ctx.trace_id().to_string(), "4bf92f3577b34da6a3ce929d0e0e4736");
    /// assert!(ctx.is_remote());
    /// ```
    pub fn from_traceparent(traceparent: &str) -> Result<Self, TraceContextError> {
        let mut parts = traceparent.trim().split('-');
        let (Some(version), Some(trace_id), Some(span_id), Some(flags), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TraceContextError::InvalidFormat);
        };

        if version != "00" {
            return Err(TraceContextError::UnsupportedVersion);
        }

        let mut ctx = Self::new(TraceId::from_hex(trace_id)?, SpanId::from_hex(span_id)?);
        ctx.flags = TraceFlags::from_hex(flags)?;
        ctx.remote = true;
        Ok(ctx)
    }

    /// Returns the `traceparent` header value.
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-{:02x}", self.trace_id, self.span_id, self.flags.as_u8())
    }

    /// Returns the trace ID.
    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Returns the span ID.
    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    /// Returns the parent span ID, if any.
    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    /// Returns the trace flags.
    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    /// Returns `true` if the trace is sampled.
    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    /// Returns `true` if this context was received from another process.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Returns the `tracestate` header value, if any.
    pub fn tracestate(&self) -> Option<&str> {
        self.tracestate.as_deref()
    }

    /// Sets the `tracestate` header value.
    #[must_use]
    pub fn with_tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.tracestate = Some(tracestate.into());
        self
    }

    /// Sets or clears the sampled flag.
    #[must_use]
    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.flags = if sampled {
            self.flags | TraceFlags::SAMPLED
        } else {
            TraceFlags(self.flags.0 & !TraceFlags::SAMPLED.0)
        };
        self
    }

    /// Marks this context as received from another process.
    #[must_use]
    pub fn into_remote(mut self) -> Self {
        self.remote = true;
        self
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new_root()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_traceparent())
    }
}

/// A 128-bit trace identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TraceId([u8; 16]);

impl TraceId {
    /// Creates a new random trace ID.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Creates a trace ID from bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parses a 32-character lowercase or uppercase hex string.
    ///
    /// The all-zero ID is invalid.
    pub fn from_hex(hex: &str) -> Result<Self, TraceContextError> {
        let mut bytes = [0u8; 16];
        if hex.len() != 32 || hex::decode_to_slice(hex, &mut bytes).is_err() {
            return Err(TraceContextError::InvalidTraceId);
        }
        if bytes == [0u8; 16] {
            return Err(TraceContextError::InvalidTraceId);
        }
        Ok(Self(bytes))
    }

    /// Returns the trace ID as bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A 64-bit span identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 8]);

impl SpanId {
    /// Creates a new random span ID.
    pub fn random() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&uuid.as_bytes()[8..]);
        Self(bytes)
    }

    /// Creates a span ID from bytes.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Parses a 16-character hex string. The all-zero ID is invalid.
    pub fn from_hex(hex: &str) -> Result<Self, TraceContextError> {
        let mut bytes = [0u8; 8];
        if hex.len() != 16 || hex::decode_to_slice(hex, &mut bytes).is_err() {
            return Err(TraceContextError::InvalidSpanId);
        }
        if bytes == [0u8; 8] {
            return Err(TraceContextError::InvalidSpanId);
        }
        Ok(Self(bytes))
    }

    /// Returns the span ID as bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Trace flags as defined by W3C Trace Context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The trace is sampled.
    pub const SAMPLED: Self = Self(0x01);

    /// Parses a two-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, TraceContextError> {
        if hex.len() != 2 {
            return Err(TraceContextError::InvalidFlags);
        }
        u8::from_str_radix(hex, 16).map(Self).map_err(|_| TraceContextError::InvalidFlags)
    }

    /// Returns `true` if the sampled flag is set.
    pub fn is_sampled(&self) -> bool {
        self.0 & Self::SAMPLED.0 != 0
    }

    /// Returns the raw flag value.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for TraceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Error parsing a propagated trace context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TraceContextError {
    /// The header is missing or malformed.
    #[error("invalid trace header format")]
    InvalidFormat,
    /// The `traceparent` version is not `00`.
    #[error("unsupported trace context version")]
    UnsupportedVersion,
    /// The trace ID is malformed or all zeroes.
    #[error("invalid trace ID")]
    InvalidTraceId,
    /// The span ID is malformed or all zeroes.
    #[error("invalid span ID")]
    InvalidSpanId,
    /// The flags field is malformed.
    #[error("invalid trace flags")]
    InvalidFlags,
}
