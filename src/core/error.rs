//! Error types for the vehicle gateway.

use thiserror::Error;

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type.
///
/// The variants follow the failure classes of the pipeline: connection
/// failures are recovered by the retry supervisor, decode failures drop the
/// offending frame, forward failures never stop sibling sinks, and
/// cancellation is a clean exit rather than a fault.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Failure opening, closing or running a hardware connection.
    #[error("connection: {0}")]
    Connection(String),

    /// A frame or packet that could not be decoded.
    #[error("decode: {0}")]
    Decode(String),

    /// A forwarder failed to deliver a snapshot.
    #[error("forward: {0}")]
    Forward(String),

    /// A sink was invoked before its backing connection was established.
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// Configuration could not be read or parsed.
    #[error("config: {0}")]
    Config(String),

    /// Shutdown was requested.
    #[error("cancelled")]
    Cancelled,

    /// Transport-level I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a forward error.
    pub fn forward(msg: impl Into<String>) -> Self {
        Self::Forward(msg.into())
    }

    /// Check whether this error is a shutdown request.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
