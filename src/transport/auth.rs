//! Identity + credential handshake.

use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::frame::escape_bytes;
use crate::codec::{auth_frame, identity_frame, is_ack};
use crate::core::constants::TAG_SIZE;
use crate::core::Credential;

use super::error::{TransportError, TransportResult};
use super::session::TransportSession;

/// Runs the handshake that must precede any payload on a fresh stream.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credential: Arc<Credential>,
}

impl Authenticator {
    /// Create an authenticator presenting `credential`.
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Arc::new(credential),
        }
    }

    /// The presented credential.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Announce the local address, present the credential and wait for an ack.
    ///
    /// Any failure after the stream is up, including send faults, a closed
    /// stream, a timeout or a non-ack reply, is
    /// [`TransportError::AuthenticationFailed`].
    pub async fn handshake(&self, session: &mut TransportSession) -> TransportResult<()> {
        let local = session.local_addr().ok_or(TransportError::NotConnected)?;
        let identity = identity_frame(&local.ip().to_string())?;
        let auth = auth_frame(&self.credential)?;

        debug!(identity = %local.ip(), "sending identity frame");
        session
            .send(&identity)
            .await
            .map_err(|e| rejected(format!("sending identity: {e}")))?;
        session
            .send(&auth)
            .await
            .map_err(|e| rejected(format!("sending credentials: {e}")))?;

        let limit = session.io_timeout();
        let reply = session
            .recv_until(|buf| buf.len() >= TAG_SIZE, limit)
            .await
            .map_err(|e| rejected(format!("awaiting acknowledgment: {e}")))?;
        debug!(reply = %escape_bytes(&reply), "handshake reply");

        if !is_ack(&reply) {
            return Err(rejected(format!("unexpected reply [{}]", escape_bytes(&reply))));
        }

        session.drain_ready().await;
        session.mark_authenticated();
        info!(space_id = self.credential.space_id(), "authenticated with ingestion service");
        Ok(())
    }
}

fn rejected(reason: String) -> TransportError {
    TransportError::AuthenticationFailed(reason)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    use super::*;
    use crate::transport::{SessionConfig, SessionState, TlsVerification};

    fn credential() -> Credential {
        Credential::new("space", "token").unwrap()
    }

    /// One-connection TLS peer: reads identity and auth, then sends `reply`.
    async fn handshake_peer(reply: Option<Vec<u8>>) -> u16 {
        let certified = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![certified.cert.der().clone()], key)
            .unwrap();
        config.send_tls13_tickets = 0;
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let expected = identity_frame("127.0.0.1").unwrap().len() + auth_frame(&credential()).unwrap().len();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(tcp).await.unwrap();
            let mut frames = vec![0u8; expected];
            tls.read_exact(&mut frames).await.unwrap();
            if let Some(reply) = reply {
                tls.write_all(&reply).await.unwrap();
                tls.flush().await.unwrap();
            }
            // Hold the connection open until the client leaves.
            let mut rest = Vec::new();
            let _ = tls.read_to_end(&mut rest).await;
        });
        port
    }

    async fn connected_session(port: u16) -> TransportSession {
        let mut config = SessionConfig::new("127.0.0.1", port);
        config.io_timeout = Duration::from_millis(300);
        config.tls = TlsVerification::Insecure;
        config.close_drain = Duration::ZERO;
        let mut session = TransportSession::new(config, credential()).unwrap();
        session.connect().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_handshake_acknowledged() {
        let port = handshake_peer(Some(b"1A".to_vec())).await;
        let mut session = connected_session(port).await;

        Authenticator::new(credential()).handshake(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.is_alive());
    }

    #[tokio::test]
    async fn test_handshake_discards_long_ack_trailer() {
        let mut reply = b"1A".to_vec();
        reply.resize(2 + 1000, b'z');
        let port = handshake_peer(Some(reply)).await;
        let mut session = connected_session(port).await;

        Authenticator::new(credential()).handshake(&mut session).await.unwrap();
        assert!(session.is_alive());
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let port = handshake_peer(Some(b"NO".to_vec())).await;
        let mut session = connected_session(port).await;

        let err = Authenticator::new(credential()).handshake(&mut session).await.unwrap_err();
        assert!(matches!(err, TransportError::AuthenticationFailed(_)));
        assert_eq!(session.state(), SessionState::Connected);
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn test_handshake_silence_is_auth_failure() {
        let port = handshake_peer(None).await;
        let mut session = connected_session(port).await;

        let err = Authenticator::new(credential()).handshake(&mut session).await.unwrap_err();
        assert!(matches!(err, TransportError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_handshake_requires_connection() {
        let mut config = SessionConfig::new("127.0.0.1", 9);
        config.tls = TlsVerification::Insecure;
        let mut session = TransportSession::new(config, credential()).unwrap();

        let err = Authenticator::new(credential()).handshake(&mut session).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }
}
