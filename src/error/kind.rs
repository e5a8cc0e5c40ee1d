//! Error kind enumeration for categorizing o11y errors.

/// Categorization of o11y errors.
///
/// | ErrorKind          | Raised by                                        | Retriable |
/// |--------------------|--------------------------------------------------|-----------|
/// | `ObserverNotFound` | context operations on a context with no Observer | No        |
/// | `Transport`        | the terminal transport                           | No        |
/// | `Connection`       | the terminal transport                           | Yes       |
/// | `Timeout`          | the terminal transport                           | Yes       |
/// | `Body`             | body-buffering decorators                        | No        |
/// | `Persistence`      | the storage decorator                            | No        |
/// | `ExporterShutdown` | `Observer::try_close`                            | No        |
/// | `Serialization`    | header / record serialization                    | No        |
/// | `Configuration`    | config loading, invalid URLs                     | No        |
/// | `InvalidArgument`  | builder misuse                                   | No        |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The context carries no Observer.
    ///
    /// Returned by every context operation except `reset`, which passes the
    /// context through unchanged instead.
    #[error("observer not found")]
    ObserverNotFound,

    /// The underlying HTTP call failed.
    #[error("transport error")]
    Transport,

    /// The underlying HTTP call could not connect.
    #[error("connection error")]
    Connection,

    /// The underlying HTTP call timed out.
    #[error("timeout")]
    Timeout,

    /// A request or response body could not be read.
    #[error("body error")]
    Body,

    /// A call record could not be committed to storage.
    #[error("persistence error")]
    Persistence,

    /// The span exporter failed to flush on shutdown.
    #[error("exporter shutdown error")]
    ExporterShutdown,

    /// A value could not be serialized.
    #[error("serialization error")]
    Serialization,

    /// Invalid configuration.
    #[error("configuration error")]
    Configuration,

    /// An argument was rejected.
    #[error("invalid argument")]
    InvalidArgument,

    /// An unexpected internal failure.
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Returns `true` if retrying the same call may succeed.
    #[inline]
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::Connection | ErrorKind::Timeout)
    }

    /// Returns `true` for failures raised by the network call itself, as
    /// opposed to the decorators around it.
    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Connection | ErrorKind::Timeout)
    }
}
