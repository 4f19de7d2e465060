//! Transport layer error types.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::core::FrameError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// TCP connection could not be established.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Remote host.
        host: String,
        /// Remote port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed or timed out.
    #[error("TLS handshake with {host} failed: {source}")]
    TlsHandshake {
        /// Remote host.
        host: String,
        /// Underlying error reported by the TLS stream.
        #[source]
        source: io::Error,
    },

    /// TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Host is not a valid DNS name or IP address for TLS.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// Identity/auth handshake rejected, malformed or timed out.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// I/O error on an established connection.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A send or receive did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which operation timed out.
        operation: &'static str,
        /// The limit that elapsed.
        after: Duration,
    },

    /// Peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// No live socket is owned by the session.
    #[error("session not connected")]
    NotConnected,

    /// Frame could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl TransportError {
    /// Whether the session cannot be established at all.
    ///
    /// Fatal errors are surfaced to the caller as-is and never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Connect { .. }
                | TransportError::TlsHandshake { .. }
                | TransportError::TlsConfig(_)
                | TransportError::InvalidServerName(_)
                | TransportError::AuthenticationFailed(_)
        )
    }

    /// Whether a rebuilt session may succeed where this one failed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::Io(_)
                | TransportError::Timeout { .. }
                | TransportError::ConnectionClosed
                | TransportError::NotConnected
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
