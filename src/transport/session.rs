//! TLS session ownership and lifecycle.
//!
//! A [`TransportSession`] owns exactly one TLS stream at a time together with
//! the sequence counter that numbers submessages on it. Rebuilding the
//! session replaces both; the previous stream is never touched again.

use std::io;
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::ClientConnection;
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::codec::Sequencer;
use crate::core::constants::{ACK_READ_CHUNK, CLOSE_DRAIN_DELAY, DEFAULT_IO_TIMEOUT};
use crate::core::Credential;

use super::auth::Authenticator;
use super::error::{TransportError, TransportResult};
use super::tls::{build_connector, server_name, TlsVerification};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket is owned.
    Disconnected,
    /// TLS established, handshake not yet completed.
    Connected,
    /// Handshake acknowledged; payloads may be sent.
    Authenticated,
}

/// Connection parameters for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ingestion host name or address.
    pub host: String,
    /// Ingestion port.
    pub port: u16,
    /// Limit applied to connect, TLS handshake, send and receive.
    pub io_timeout: Duration,
    /// Server certificate verification.
    pub tls: TlsVerification,
    /// Grace period after the write half is shut down on close.
    pub close_drain: Duration,
}

impl SessionConfig {
    /// Create a config with default timeouts and TLS verification.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            io_timeout: DEFAULT_IO_TIMEOUT,
            tls: TlsVerification::default(),
            close_drain: CLOSE_DRAIN_DELAY,
        }
    }
}

/// One TLS connection to the ingestion service plus its sequencing state.
pub struct TransportSession {
    config: SessionConfig,
    connector: TlsConnector,
    server_name: ServerName<'static>,
    authenticator: Authenticator,
    stream: Option<TlsStream<TcpStream>>,
    local_addr: Option<SocketAddr>,
    state: SessionState,
    sequencer: Sequencer,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .field("next_sequence", &self.sequencer.peek())
            .finish_non_exhaustive()
    }
}

impl TransportSession {
    /// Create a disconnected session. TLS settings are validated here.
    pub fn new(config: SessionConfig, credential: Credential) -> TransportResult<Self> {
        let connector = build_connector(&config.tls)?;
        let server_name = server_name(&config.host)?;

        Ok(Self {
            config,
            connector,
            server_name,
            authenticator: Authenticator::new(credential),
            stream: None,
            local_addr: None,
            state: SessionState::Disconnected,
            sequencer: Sequencer::new(),
        })
    }

    /// Open a fresh TCP connection and upgrade it to TLS.
    ///
    /// Any previously owned stream is discarded first. The session ends up
    /// [`SessionState::Connected`]; the handshake must run before payloads
    /// are sent.
    pub async fn connect(&mut self) -> TransportResult<()> {
        self.discard().await;

        let host = self.config.host.clone();
        let port = self.config.port;
        let io_timeout = self.config.io_timeout;

        let tcp = match timeout(io_timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(source)) => return Err(TransportError::Connect { host, port, source }),
            Err(_) => {
                return Err(TransportError::Connect {
                    host,
                    port,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                });
            }
        };
        let local_addr = tcp.local_addr().map_err(|source| TransportError::Connect {
            host: host.clone(),
            port,
            source,
        })?;
        // Frames are small and each waits for an ack.
        let _ = tcp.set_nodelay(true);

        let tls = match timeout(io_timeout, self.connector.connect(self.server_name.clone(), tcp)).await {
            Ok(Ok(tls)) => tls,
            Ok(Err(source)) => return Err(TransportError::TlsHandshake { host, source }),
            Err(_) => {
                return Err(TransportError::TlsHandshake {
                    host,
                    source: io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"),
                });
            }
        };

        self.stream = Some(tls);
        self.local_addr = Some(local_addr);
        self.state = SessionState::Connected;
        self.sequencer.reset();

        info!(%host, port, local = %local_addr, "connected to ingestion service");
        Ok(())
    }

    /// Non-blocking liveness probe.
    ///
    /// The service never speaks unprompted; it only closes connections that
    /// have been idle for about two minutes. A session holding readable bytes
    /// while no reply is expected is therefore dead, whether those bytes sit
    /// in the socket or already decrypted inside the TLS layer.
    pub fn is_alive(&mut self) -> bool {
        if self.state != SessionState::Authenticated {
            return false;
        }
        match &mut self.stream {
            Some(stream) => {
                let (tcp, tls) = stream.get_mut();
                !tls_has_pending(tls) && !peer_has_spoken(tcp)
            }
            None => false,
        }
    }

    /// Rebuild the session if it is dead or was never established.
    ///
    /// Returns `true` when a reconnect happened.
    pub async fn reconnect_if_dead(&mut self) -> TransportResult<bool> {
        if self.is_alive() {
            return Ok(false);
        }
        if self.stream.is_some() {
            info!(host = %self.config.host, "detected closed connection, reconnecting");
        }
        self.reconnect().await?;
        Ok(true)
    }

    /// Unconditionally replace the stream and re-authenticate.
    ///
    /// Sequencing restarts at 1 on the new stream.
    pub async fn reconnect(&mut self) -> TransportResult<()> {
        self.connect().await?;
        let authenticator = self.authenticator.clone();
        authenticator.handshake(self).await
    }

    /// Write the whole buffer or fail.
    pub async fn send(&mut self, bytes: &[u8]) -> TransportResult<()> {
        let io_timeout = self.config.io_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout(io_timeout, write).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::Timeout {
                operation: "send",
                after: io_timeout,
            }),
        }
    }

    /// Accumulate received bytes until `done` accepts the buffer.
    ///
    /// Fails with [`TransportError::Timeout`] if `limit` elapses first and
    /// with [`TransportError::ConnectionClosed`] if the peer closes.
    pub async fn recv_until<F>(&mut self, mut done: F, limit: Duration) -> TransportResult<Vec<u8>>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = Instant::now() + limit;

        let mut buf = Vec::new();
        let mut chunk = [0u8; ACK_READ_CHUNK];
        while !done(&buf) {
            match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => return Err(TransportError::ConnectionClosed),
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(TransportError::Timeout {
                        operation: "receive",
                        after: limit,
                    });
                }
            }
        }
        Ok(buf)
    }

    /// Consume whatever is already readable without waiting.
    ///
    /// Used after an acknowledgment so that a trailer longer than one read
    /// is not mistaken for the reply to the next frame. Returns the number
    /// of bytes discarded.
    pub async fn drain_ready(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };

        let mut drained = 0;
        let mut chunk = [0u8; ACK_READ_CHUNK];
        // A zero timeout polls the read once and gives up if it would block.
        while let Ok(Ok(n)) = timeout(Duration::ZERO, stream.read(&mut chunk)).await {
            if n == 0 {
                break;
            }
            drained += n;
        }
        if drained > 0 {
            debug!(bytes = drained, "discarded acknowledgment trailer");
        }
        drained
    }

    /// Half-close, let in-flight acks drain, then drop the stream.
    ///
    /// Idempotent; errors are logged and swallowed.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            match timeout(self.config.io_timeout, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "error shutting down write half"),
                Err(_) => debug!("timed out shutting down write half"),
            }
            tokio::time::sleep(self.config.close_drain).await;
            info!(host = %self.config.host, "session closed");
        }
        self.local_addr = None;
        self.state = SessionState::Disconnected;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Local address of the owned socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Per-operation I/O limit.
    pub fn io_timeout(&self) -> Duration {
        self.config.io_timeout
    }

    /// Connection parameters.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Credential presented on every handshake.
    pub fn credential(&self) -> &Credential {
        self.authenticator.credential()
    }

    /// Sequence counter of the current stream.
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Mutable sequence counter, for building wrappers.
    pub fn sequencer_mut(&mut self) -> &mut Sequencer {
        &mut self.sequencer
    }

    pub(super) fn mark_authenticated(&mut self) {
        self.state = SessionState::Authenticated;
    }

    /// Drop the current stream without ceremony; the peer may be gone.
    async fn discard(&mut self) {
        if let Some(mut old) = self.stream.take() {
            let _ = timeout(self.config.close_drain, old.shutdown()).await;
            debug!("discarded previous stream");
        }
        self.local_addr = None;
        self.state = SessionState::Disconnected;
    }
}

/// Whether the TLS layer holds decrypted bytes or a close the caller has
/// not consumed yet.
fn tls_has_pending(tls: &mut ClientConnection) -> bool {
    match tls.process_new_packets() {
        Ok(io) if io.plaintext_bytes_to_read() > 0 => {
            debug!(bytes = io.plaintext_bytes_to_read(), "unread data buffered in TLS layer");
            true
        }
        Ok(io) => io.peer_has_closed(),
        Err(e) => {
            debug!(error = %e, "TLS layer in error state");
            true
        }
    }
}

/// Peek one byte without blocking. Data or EOF both count as "spoken".
fn peer_has_spoken(tcp: &TcpStream) -> bool {
    let mut probe = [MaybeUninit::<u8>::uninit(); 1];
    match SockRef::from(tcp).peek(&mut probe) {
        Ok(0) => {
            debug!("peer closed idle connection");
            true
        }
        Ok(n) => {
            debug!(bytes = n, "unsolicited data on idle connection");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
        Err(e) => {
            debug!(error = %e, "idle connection probe failed");
            true
        }
    }
}
