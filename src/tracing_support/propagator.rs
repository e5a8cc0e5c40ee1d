//! Trace context propagation across process boundaries.

use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::tracing_support::context::{SpanId, TraceContext, TraceContextError, TraceId};

/// Read access to a header carrier.
pub trait HeaderExtractor {
    /// Gets a header value by (lowercase) name.
    fn get(&self, key: &str) -> Option<&str>;
}

/// Write access to a header carrier.
pub trait HeaderInjector {
    /// Sets a header value, replacing any previous value.
    fn set(&mut self, key: &str, value: String);
}

impl HeaderExtractor for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key).map(String::as_str)
    }
}

impl HeaderInjector for HashMap<String, String> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}

impl HeaderExtractor for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|value| value.to_str().ok())
    }
}

impl HeaderInjector for HeaderMap {
    fn set(&mut self, key: &str, value: String) {
        // Propagators only emit ASCII, a rejected pair is dropped rather than sent half-formed.
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(&value))
        {
            self.insert(name, value);
        }
    }
}

/// A trace context wire format.
pub trait Propagator: Send + Sync {
    /// Extracts a trace context from headers.
    fn extract<E: HeaderExtractor>(&self, extractor: &E)
    -> Result<TraceContext, TraceContextError>;

    /// Injects a trace context into headers.
    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I);
}

/// W3C Trace Context propagator (`traceparent` / `tracestate`).
///
/// This is the format outbound calls carry by default.
///
/// ## Example
///
/// ```rust
/// use http::HeaderMap;
/// use o11y::tracing_support::{Propagator, TraceContext, W3CTraceContext};
///
/// let mut headers = HeaderMap::new();
/// W3CTraceContext.inject(&TraceContext::new_root(), &mut headers);
///
/// assert!(headers.contains_key("traceparent"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct W3CTraceContext;

impl W3CTraceContext {
    /// The traceparent header name.
    pub const TRACEPARENT: &'static str = "traceparent";
    /// The tracestate header name.
    pub const TRACESTATE: &'static str = "tracestate";
}

impl Propagator for W3CTraceContext {
    fn extract<E: HeaderExtractor>(
        &self,
        extractor: &E,
    ) -> Result<TraceContext, TraceContextError> {
        let traceparent =
            extractor.get(Self::TRACEPARENT).ok_or(TraceContextError::InvalidFormat)?;
        let ctx = TraceContext::from_traceparent(traceparent)?;

        Ok(match extractor.get(Self::TRACESTATE) {
            Some(tracestate) if !tracestate.is_empty() => ctx.with_tracestate(tracestate),
            _ => ctx,
        })
    }

    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I) {
        injector.set(Self::TRACEPARENT, context.to_traceparent());

        if let Some(tracestate) = context.tracestate() {
            injector.set(Self::TRACESTATE, tracestate.to_string());
        }
    }
}

/// B3 propagator for Zipkin-compatible peers.
///
/// Supports both the single `b3` header and the `x-b3-*` header family.
#[derive(Debug, Clone, Copy)]
pub struct B3Propagator {
    single_header: bool,
}

impl B3Propagator {
    /// B3 single header name.
    pub const B3: &'static str = "b3";
    /// X-B3-TraceId header name.
    pub const X_B3_TRACE_ID: &'static str = "x-b3-traceid";
    /// X-B3-SpanId header name.
    pub const X_B3_SPAN_ID: &'static str = "x-b3-spanid";
    /// X-B3-Sampled header name.
    pub const X_B3_SAMPLED: &'static str = "x-b3-sampled";
    /// X-B3-ParentSpanId header name.
    pub const X_B3_PARENT_SPAN_ID: &'static str = "x-b3-parentspanid";

    /// Injects the single `b3` header.
    pub fn single() -> Self {
        Self { single_header: true }
    }

    /// Injects the `x-b3-*` header family.
    pub fn multi() -> Self {
        Self { single_header: false }
    }
}

impl Default for B3Propagator {
    fn default() -> Self {
        Self::single()
    }
}

impl Propagator for B3Propagator {
    fn extract<E: HeaderExtractor>(
        &self,
        extractor: &E,
    ) -> Result<TraceContext, TraceContextError> {
        // Either format is accepted regardless of which one this propagator injects.
        if let Some(b3) = extractor.get(Self::B3) {
            return parse_b3_single(b3);
        }

        let trace_id =
            extractor.get(Self::X_B3_TRACE_ID).ok_or(TraceContextError::InvalidFormat)?;
        let span_id = extractor.get(Self::X_B3_SPAN_ID).ok_or(TraceContextError::InvalidFormat)?;
        let sampled = extractor.get(Self::X_B3_SAMPLED).is_none_or(is_b3_sampled);

        let ctx = TraceContext::new(b3_trace_id(trace_id)?, SpanId::from_hex(span_id)?);
        Ok(ctx.with_sampled(sampled).into_remote())
    }

    fn inject<I: HeaderInjector>(&self, context: &TraceContext, injector: &mut I) {
        let sampled = if context.is_sampled() { "1" } else { "0" };

        if self.single_header {
            injector.set(
                Self::B3,
                format!("{}-{}-{}", context.trace_id(), context.span_id(), sampled),
            );
            return;
        }

        injector.set(Self::X_B3_TRACE_ID, context.trace_id().to_string());
        injector.set(Self::X_B3_SPAN_ID, context.span_id().to_string());
        injector.set(Self::X_B3_SAMPLED, sampled.to_string());
        if let Some(parent) = context.parent_span_id() {
            injector.set(Self::X_B3_PARENT_SPAN_ID, parent.to_string());
        }
    }
}

/// B3 allows 64-bit trace IDs; they are left-padded to 128 bits.
fn b3_trace_id(hex: &str) -> Result<TraceId, TraceContextError> {
    if hex.len() == 16 {
        return TraceId::from_hex(&format!("{:0>32}", hex));
    }
    TraceId::from_hex(hex)
}

fn is_b3_sampled(flag: &str) -> bool {
    flag == "1" || flag == "d" || flag.eq_ignore_ascii_case("true")
}

/// Parses `{trace_id}-{span_id}[-{sampling}[-{parent_span_id}]]`.
///
/// A bare sampling decision (`0` / `1`) carries no IDs and is rejected, since
/// there is no remote span to parent to.
fn parse_b3_single(b3: &str) -> Result<TraceContext, TraceContextError> {
    let mut parts = b3.trim().split('-');
    let (Some(trace_id), Some(span_id)) = (parts.next(), parts.next()) else {
        return Err(TraceContextError::InvalidFormat);
    };

    let sampled = parts.next().is_none_or(is_b3_sampled);
    let ctx = TraceContext::new(b3_trace_id(trace_id)?, SpanId::from_hex(span_id)?);
    Ok(ctx.with_sampled(sampled).into_remote())
}
