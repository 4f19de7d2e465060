//! Mock ingestion peer speaking the Logmet wire format over TLS.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use logmet_protocol::codec::WrapperFrame;
use logmet_protocol::transport::TlsVerification;
use logmet_protocol::{ClientError, LogmetClient, LogmetClientBuilder};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

pub const SPACE_ID: &str = "deadbeef1234567890";
pub const TOKEN: &str = "logging-token";

/// Per-operation timeout used by test clients.
pub const TEST_IO_TIMEOUT: Duration = Duration::from_millis(300);

/// How the peer treats handshakes and wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Ack every handshake and wrapper.
    AckAll,
    /// Read identity and auth, then close without replying.
    CloseAfterAuth,
    /// Answer the handshake with something other than an ack.
    RejectAuth,
    /// Drop the connection on the first wrapper ever received; ack the rest.
    DropFirstWrapper,
    /// Reply with garbage to the first wrapper; ack the rest.
    GarbageFirstAck,
    /// Never ack a wrapper.
    NeverAck,
    /// Leave the first `n` wrappers unanswered, ack the rest.
    SilentFor(usize),
    /// Ack the first wrapper, then close the connection as if idle.
    CloseAfterFirstAck,
    /// Ack the first wrapper, then push unsolicited bytes.
    ChatterAfterFirstAck,
    /// Ack handshakes and wrappers with `1A` followed by `n` trailer bytes,
    /// written in one go.
    AckWithTrailer(usize),
    /// Read identity and auth, then keep the connection open without replying.
    SilentAfterAuth,
}

/// Something the peer observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Identity frame on connection `conn`.
    Identity { conn: usize, identity: String },
    /// Auth frame on connection `conn`.
    Auth {
        conn: usize,
        space_id: String,
        token: String,
    },
    /// Wrapper frame on connection `conn`.
    Wrapper { conn: usize, frame: WrapperFrame },
}

#[derive(Debug, Default)]
struct PeerLog {
    connections: usize,
    wrappers_seen: usize,
    events: Vec<Event>,
}

/// A TLS listener on 127.0.0.1 with a fresh self-signed certificate.
pub struct MockPeer {
    addr: SocketAddr,
    cert: CertificateDer<'static>,
    log: Arc<Mutex<PeerLog>>,
}

impl MockPeer {
    pub async fn start(behavior: Behavior) -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string(), "localhost".to_string()])
                .unwrap();
        let cert = certified.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert.clone()], key)
            .unwrap();
        // Tickets would show up as unsolicited bytes on an idle client socket.
        config.send_tls13_tickets = 0;
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(PeerLog::default()));

        let accept_log = log.clone();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let log = accept_log.clone();
                tokio::spawn(async move {
                    let conn = {
                        let mut log = log.lock().unwrap();
                        log.connections += 1;
                        log.connections - 1
                    };
                    if let Ok(tls) = acceptor.accept(tcp).await {
                        serve(conn, tls, behavior, log).await;
                    }
                });
            }
        });

        Self { addr, cert, log }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The peer's certificate, usable as a trust anchor.
    pub fn cert(&self) -> CertificateDer<'static> {
        self.cert.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().events.clone()
    }

    /// Connections that completed the TLS handshake or attempted to.
    pub fn connections(&self) -> usize {
        self.log.lock().unwrap().connections
    }

    /// Connections on which an auth frame arrived.
    pub fn auths(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Auth { conn, .. } => Some(conn),
                _ => None,
            })
            .collect()
    }

    /// Wrapper frames with the connection they arrived on.
    pub fn wrappers(&self) -> Vec<(usize, WrapperFrame)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Wrapper { conn, frame } => Some((conn, frame)),
                _ => None,
            })
            .collect()
    }

    /// Insecure client with short timeouts pointed at this peer.
    pub async fn client(&self) -> Result<LogmetClient, ClientError> {
        self.builder().connect().await
    }

    pub fn builder(&self) -> LogmetClientBuilder {
        LogmetClientBuilder::new("127.0.0.1", self.port())
            .credentials(SPACE_ID, TOKEN)
            .io_timeout(TEST_IO_TIMEOUT)
            .tls_verification(TlsVerification::Insecure)
            .close_drain(Duration::from_millis(10))
    }
}

async fn serve(conn: usize, mut stream: TlsStream<TcpStream>, behavior: Behavior, log: Arc<Mutex<PeerLog>>) {
    loop {
        let mut tag = [0u8; 2];
        if stream.read_exact(&mut tag).await.is_err() {
            return;
        }

        match &tag {
            b"1I" => {
                let Ok(identity) = read_short_field(&mut stream).await else { return };
                log.lock().unwrap().events.push(Event::Identity { conn, identity });
            }
            b"2T" => {
                let Ok(space_id) = read_short_field(&mut stream).await else { return };
                let Ok(token) = read_short_field(&mut stream).await else { return };
                log.lock().unwrap().events.push(Event::Auth {
                    conn,
                    space_id,
                    token,
                });

                match behavior {
                    Behavior::CloseAfterAuth => return,
                    Behavior::SilentAfterAuth => {}
                    Behavior::RejectAuth => {
                        let _ = stream.write_all(b"NO").await;
                        let _ = stream.flush().await;
                    }
                    _ => {
                        if send_ack(&mut stream, behavior).await.is_err() {
                            return;
                        }
                    }
                }
            }
            b"1W" => {
                let Ok(raw) = read_wrapper_body(&mut stream).await else { return };
                let Ok(frame) = WrapperFrame::decode(&raw) else { return };

                let index = {
                    let mut log = log.lock().unwrap();
                    log.events.push(Event::Wrapper { conn, frame });
                    log.wrappers_seen += 1;
                    log.wrappers_seen - 1
                };

                let replied = match behavior {
                    Behavior::DropFirstWrapper if index == 0 => return,
                    Behavior::GarbageFirstAck if index == 0 => match stream.write_all(b"XX").await {
                        Ok(()) => stream.flush().await,
                        Err(e) => Err(e),
                    },
                    Behavior::NeverAck => Ok(()),
                    Behavior::SilentFor(n) if index < n => Ok(()),
                    _ => send_ack(&mut stream, behavior).await,
                };
                if replied.is_err() {
                    return;
                }

                // Let the client consume the ack before the connection goes bad.
                match behavior {
                    Behavior::CloseAfterFirstAck if index == 0 => {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        return;
                    }
                    Behavior::ChatterAfterFirstAck if index == 0 => {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        let _ = stream.write_all(b"XX").await;
                        let _ = stream.flush().await;
                    }
                    _ => {}
                }
            }
            _ => return,
        }
    }
}

async fn send_ack(stream: &mut TlsStream<TcpStream>, behavior: Behavior) -> std::io::Result<()> {
    let mut ack = b"1A".to_vec();
    if let Behavior::AckWithTrailer(n) = behavior {
        ack.resize(2 + n, b'z');
    }
    stream.write_all(&ack).await?;
    stream.flush().await
}

async fn read_short_field(stream: &mut TlsStream<TcpStream>) -> std::io::Result<String> {
    let len = stream.read_u8().await? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read the rest of a wrapper whose tag was already consumed, re-assembling
/// the complete frame bytes.
async fn read_wrapper_body(stream: &mut TlsStream<TcpStream>) -> std::io::Result<Vec<u8>> {
    let mut raw = b"1W".to_vec();
    let count = stream.read_u32().await?;
    raw.extend_from_slice(&count.to_be_bytes());

    for _ in 0..count {
        let mut header = [0u8; 6];
        stream.read_exact(&mut header).await?;
        raw.extend_from_slice(&header);

        let len = stream.read_u32().await?;
        raw.extend_from_slice(&len.to_be_bytes());

        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload).await?;
        raw.extend_from_slice(&payload);
    }
    Ok(raw)
}
