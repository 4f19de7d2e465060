//! TLS client configuration.
//!
//! Certificate verification is an explicit setting. The default verifies
//! against the platform trust store and, when no trust anchors can be loaded
//! at all, falls back to an unverified connection with a warning. The
//! ingestion service has historically been reachable that way; callers who
//! need a hard guarantee pick [`TlsVerification::SystemRoots`] with the
//! fallback disabled, or [`TlsVerification::CustomRoots`].

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use super::error::TransportError;

/// How the server certificate is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsVerification {
    /// Verify against the platform trust store.
    SystemRoots {
        /// Connect without verification if the trust store is unavailable.
        allow_insecure_fallback: bool,
    },
    /// Verify against the given trust anchors only.
    CustomRoots(Vec<CertificateDer<'static>>),
    /// Accept any certificate. Encrypts, but does not authenticate the peer.
    Insecure,
}

impl Default for TlsVerification {
    fn default() -> Self {
        TlsVerification::SystemRoots {
            allow_insecure_fallback: true,
        }
    }
}

/// Build a connector for `mode`.
pub(crate) fn build_connector(mode: &TlsVerification) -> Result<TlsConnector, TransportError> {
    connector_with_roots(mode, system_roots)
}

/// Build a connector, calling `load_system_roots` only for
/// [`TlsVerification::SystemRoots`].
fn connector_with_roots(
    mode: &TlsVerification,
    load_system_roots: impl FnOnce() -> Option<RootCertStore>,
) -> Result<TlsConnector, TransportError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::TlsConfig(e.to_string()))?;

    let config = match mode {
        TlsVerification::SystemRoots {
            allow_insecure_fallback,
        } => match load_system_roots() {
            Some(roots) => builder.with_root_certificates(roots).with_no_client_auth(),
            None if *allow_insecure_fallback => {
                warn!("no platform trust anchors available, connecting without certificate verification");
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoCertificateVerification(provider)))
                    .with_no_client_auth()
            }
            None => {
                return Err(TransportError::TlsConfig(
                    "no platform trust anchors available".into(),
                ));
            }
        },
        TlsVerification::CustomRoots(certs) => {
            let mut roots = RootCertStore::empty();
            for cert in certs {
                roots
                    .add(cert.clone())
                    .map_err(|e| TransportError::TlsConfig(format!("invalid trust anchor: {e}")))?;
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsVerification::Insecure => {
            warn!("certificate verification disabled by configuration");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification(provider)))
                .with_no_client_auth()
        }
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Parse `host` into the name presented for SNI and verification.
pub(crate) fn server_name(host: &str) -> Result<ServerName<'static>, TransportError> {
    ServerName::try_from(host.to_owned()).map_err(|e| TransportError::InvalidServerName(format!("{host}: {e}")))
}

fn system_roots() -> Option<RootCertStore> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        debug!(error = %err, "skipping unreadable platform certificate");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!(added, ignored, "loaded platform trust anchors");

    (!roots.is_empty()).then_some(roots)
}

/// Accepts any server certificate while still checking handshake signatures.
#[derive(Debug)]
struct NoCertificateVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
