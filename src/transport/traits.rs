//! The outbound call abstraction and its request/response types.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use url::Url;

use crate::error::Result;
use crate::Context;

/// A streamed body: chunks of bytes, any of which may fail.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// A request or response body.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// A fully buffered body. Reading it is free and repeatable.
    Full(Bytes),
    /// A body still arriving. Reading it consumes it.
    Stream(BodyStream),
}

impl Body {
    /// Wraps a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Body::Stream(stream.boxed())
    }

    /// Returns `true` if the body is held in memory.
    pub fn is_buffered(&self) -> bool {
        !matches!(self, Body::Stream(_))
    }

    /// The buffered bytes, or `None` for a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[]),
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the first error the stream yields.
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            },
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => f.debug_tuple("Body::Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(bytes.into())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Full(text.into())
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Full(Bytes::from_static(text.as_bytes()))
    }
}

/// An outbound request.
///
/// `context` carries the caller's Observer and active trace into the
/// transport chain.
#[derive(Debug)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Body,
    /// Request-scoped context.
    pub context: Context,
}

impl HttpRequest {
    /// Creates a request with no headers, no body and an empty context.
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: Body::Empty, context: Context::new() }
    }

    /// A `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A `POST` request.
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the context.
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// A response to an outbound request.
#[derive(Debug)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Body,
}

impl HttpResponse {
    /// Creates a response with no headers and no body.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Body::Empty }
    }

    /// Appends a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns the first error the body stream yields.
    pub async fn bytes(self) -> Result<Bytes> {
        self.body.collect().await
    }

    /// Reads the whole body as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Returns the first error the body stream yields.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// The future a [`RoundTrip`] returns.
pub type ResponseFuture<'a> = BoxFuture<'a, Result<HttpResponse>>;

/// Performs one outbound HTTP call.
///
/// Implemented by terminal transports such as
/// [`RestTransport`](crate::transport::RestTransport) and by every decorator
/// in the chain, which wrap an inner `RoundTrip`.
pub trait RoundTrip: Send + Sync + fmt::Debug {
    /// Sends `request` and resolves to the response.
    fn round_trip(&self, request: HttpRequest) -> ResponseFuture<'_>;
}

impl<T: RoundTrip + ?Sized> RoundTrip for Arc<T> {
    fn round_trip(&self, request: HttpRequest) -> ResponseFuture<'_> {
        (**self).round_trip(request)
    }
}

/// Adapts a closure into a [`RoundTrip`].
///
/// ```rust
/// use http::StatusCode;
/// use o11y::transport::{HttpRequest, HttpResponse, RoundTrip, RoundTripFn};
///
/// let always_ok =
///     RoundTripFn::new(|_req: HttpRequest| async { Ok(HttpResponse::new(StatusCode::OK)) });
/// # fn assert_round_trip<T: RoundTrip>(_: &T) {}
/// # assert_round_trip(&always_ok);
/// ```
pub struct RoundTripFn<F> {
    f: F,
}

impl<F> RoundTripFn<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for RoundTripFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundTripFn").finish_non_exhaustive()
    }
}

impl<F, Fut> RoundTrip for RoundTripFn<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse>> + Send + 'static,
{
    fn round_trip(&self, request: HttpRequest) -> ResponseFuture<'_> {
        Box::pin((self.f)(request))
    }
}
