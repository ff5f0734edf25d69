//! Domain-specific error types for the AMCP client.
//!
//! All fallible operations return `Result<T, AmcpError>`.
//! Only the transport-class variants reset the connection; everything
//! else fails the single command that produced it.

use std::time::Duration;
use thiserror::Error;

use crate::protocol::ProtocolFailure;

/// Convenience alias used throughout the crate.
pub type Result<T, E = AmcpError> = std::result::Result<T, E>;

/// The canonical error type for the AMCP client.
#[derive(Debug, Error)]
pub enum AmcpError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// No socket could be established for the command.
    #[error("not connected to {0}")]
    NotConnected(String),

    /// The peer did not answer within the receive timeout.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),

    /// The stream ended before a CRLF terminator was read.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A response line exceeded the codec limit.
    #[error("response line too long: more than {max} bytes")]
    LineTooLong { max: usize },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The server answered with a recognised error status code.
    #[error("{failure} ({status})")]
    Protocol {
        failure: ProtocolFailure,
        status: String,
    },

    /// A reply did not match the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The command cannot be framed as a single request line.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// The connection has been closed; no further commands run.
    #[error("connection disposed")]
    Disposed,
}

impl AmcpError {
    /// Returns `true` for failures of the socket itself.
    ///
    /// These are the only errors after which the worker drops the
    /// transport so that the next command reconnects.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::NotConnected(_)
                | Self::Timeout(_)
                | Self::ConnectionClosed
                | Self::LineTooLong { .. }
        )
    }

    /// The protocol failure kind, if the server rejected the command.
    pub fn protocol_failure(&self) -> Option<ProtocolFailure> {
        match self {
            Self::Protocol { failure, .. } => Some(*failure),
            _ => None,
        }
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AmcpError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AmcpError::Disposed
    }
}
