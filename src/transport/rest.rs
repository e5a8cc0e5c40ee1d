//! Terminal transport over reqwest.

use std::time::Duration;

use futures::TryStreamExt;

use super::traits::{Body, HttpRequest, HttpResponse, ResponseFuture, RoundTrip};
use crate::error::{Error, ErrorKind, Result};

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Builder for [`RestTransport`].
#[derive(Debug)]
pub struct RestTransportBuilder {
    timeout: Duration,
    connect_timeout: Duration,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Duration,
    user_agent: String,
    ca_cert_pem: Option<String>,
}

impl RestTransportBuilder {
    fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ca_cert_pem: None,
        }
    }

    /// Sets the whole-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum idle connections kept per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Sets how long idle connections are kept.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Sets the `User-Agent` sent with every request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Trusts an additional CA certificate, PEM encoded.
    pub fn ca_cert_pem(mut self, pem: impl Into<String>) -> Self {
        self.ca_cert_pem = Some(pem.into());
        self
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the certificate is invalid or the
    /// client cannot be created.
    pub fn build(self) -> Result<RestTransport> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(self.user_agent);

        if let Some(pem) = &self.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                Error::new(ErrorKind::Configuration, format!("invalid CA certificate PEM: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|e| {
            Error::new(ErrorKind::Configuration, format!("failed to create HTTP client: {e}"))
        })?;

        Ok(RestTransport { client })
    }
}

/// Sends requests with a [`reqwest::Client`].
///
/// Streamed request bodies are forwarded as streams; response bodies are
/// returned as streams for the decorators above to buffer if they need to.
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
}

impl RestTransport {
    /// Creates a builder with default timeouts.
    pub fn builder() -> RestTransportBuilder {
        RestTransportBuilder::new()
    }

    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client cannot be created.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl RoundTrip for RestTransport {
    fn round_trip(&self, request: HttpRequest) -> ResponseFuture<'_> {
        Box::pin(async move {
            let HttpRequest { method, url, headers, body, .. } = request;

            let mut outbound = self.client.request(method, url).headers(headers);
            outbound = match body {
                Body::Empty => outbound,
                Body::Full(bytes) => outbound.body(bytes),
                Body::Stream(stream) => outbound.body(reqwest::Body::wrap_stream(stream)),
            };

            let response = outbound.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = Body::from_stream(response.bytes_stream().map_err(Error::from));

            Ok(HttpResponse { status, headers, body })
        })
    }
}
