//! Acknowledgment-synchronized delivery with a single rebuild-and-retry.

use tracing::{debug, info, warn};

use crate::codec::frame::escape_bytes;
use crate::codec::{is_ack, wrap, Payload, SubmessageKind};
use crate::core::constants::{MAX_DELIVERY_ATTEMPTS, TAG_SIZE};
use crate::transport::TransportSession;

use super::error::ClientError;

/// Drives payloads through a [`TransportSession`].
///
/// Each [`emit`](Self::emit) is one awaitable round trip: liveness check,
/// wrap, send, wait for the ack. A failed attempt triggers exactly one
/// reconnect and resend with a fresh sequence number; there is no unbounded
/// resend loop.
#[derive(Debug)]
pub struct DeliveryPipeline {
    session: TransportSession,
}

impl DeliveryPipeline {
    /// Wrap an existing session.
    pub fn new(session: TransportSession) -> Self {
        Self { session }
    }

    /// Connect and authenticate, replacing any current stream.
    pub async fn establish(&mut self) -> Result<(), ClientError> {
        self.session.reconnect().await.map_err(ClientError::from)
    }

    /// Deliver one payload and wait for its acknowledgment.
    ///
    /// Connection and authentication failures while restoring a dead session
    /// are returned as-is, as is any attempt error that is not
    /// [retryable](ClientError::is_retryable). Transport and protocol faults
    /// get one rebuild-and-retry; if that fails too the result is
    /// [`ClientError::DeliveryFailed`] and the pipeline stays usable.
    pub async fn emit(&mut self, payload: &Payload) -> Result<(), ClientError> {
        let kind = payload.kind();
        let body = payload.encode(self.session.credential().space_id());

        if self.session.reconnect_if_dead().await? {
            debug!("session rebuilt before send");
        }

        let first = match self.attempt(&body, kind).await {
            Ok(sequence) => {
                debug!(sequence, ?kind, "payload acknowledged");
                return Ok(());
            }
            Err(err) if err.is_retryable() => err,
            Err(err) => return Err(err),
        };
        warn!(error = %first, ?kind, "delivery attempt failed, rebuilding session");

        let retry = match self.session.reconnect().await {
            Ok(()) => self.attempt(&body, kind).await,
            Err(err) => Err(err.into()),
        };
        match retry {
            Ok(sequence) => {
                info!(sequence, ?kind, "payload acknowledged after reconnect");
                Ok(())
            }
            Err(last) => {
                warn!(error = %last, ?kind, "retry failed, giving up on payload");
                Err(ClientError::DeliveryFailed {
                    attempts: MAX_DELIVERY_ATTEMPTS,
                    last: Box::new(last),
                })
            }
        }
    }

    /// Close the underlying session.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    /// The owned session.
    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// One send/ack round trip. Returns the sequence number used.
    async fn attempt(&mut self, body: &[u8], kind: SubmessageKind) -> Result<u32, ClientError> {
        let sequence = self.session.sequencer().peek();
        let wrapper = wrap(&[body], kind, self.session.sequencer_mut());
        debug!(sequence, frame = %escape_bytes(&wrapper), "sending wrapper");

        self.session.send(&wrapper).await?;

        let limit = self.session.io_timeout();
        let reply = self
            .session
            .recv_until(|buf| buf.len() >= TAG_SIZE, limit)
            .await?;
        debug!(reply = %escape_bytes(&reply), "ack buffer");

        if !is_ack(&reply) {
            return Err(ClientError::Protocol(format!(
                "unexpected acknowledgment [{}]",
                escape_bytes(&reply)
            )));
        }
        self.session.drain_ready().await;
        Ok(sequence)
    }
}
