//! Logmet Protocol - Transport Layer
//!
//! This module owns the connection to the ingestion service:
//!
//! - **TLS setup**: [`TlsVerification`] with an explicit insecure fallback
//! - **Session lifecycle**: [`TransportSession`] connect, idle-drop probe,
//!   reconnect, raw send/receive and close
//! - **Handshake**: [`Authenticator`] identity + credential exchange
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Delivery Pipeline               │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   session, handshake, liveness          │
//! ├─────────────────────────────────────────┤
//! │              TLS                        │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```

mod auth;
mod error;
mod session;
mod tls;

pub use auth::Authenticator;
pub use error::*;
pub use session::{SessionConfig, SessionState, TransportSession};
pub use tls::TlsVerification;
