//! Errors surfaced by the Logmet client.

use thiserror::Error;

use crate::core::FrameError;
use crate::transport::TransportError;

/// Errors that can occur in the Logmet client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection could not be established. Not retried.
    #[error("connection failed: {0}")]
    Connection(#[source] TransportError),

    /// The service rejected or never answered the handshake.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Socket fault on an established connection.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// Reply was not a valid acknowledgment.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The first attempt and its retry both failed.
    #[error("delivery failed after {attempts} attempts: {last}")]
    DeliveryFailed {
        /// Attempts made, including the retry.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        last: Box<ClientError>,
    },

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Frame could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl ClientError {
    /// Whether this fault is handled by a rebuild-and-retry inside an emit call.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_recoverable(),
            ClientError::Protocol(_) => true,
            _ => false,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::AuthenticationFailed(reason) => ClientError::AuthenticationFailed(reason),
            TransportError::Frame(e) => ClientError::Frame(e),
            e if e.is_fatal() => ClientError::Connection(e),
            e => ClientError::Transport(e),
        }
    }
}
