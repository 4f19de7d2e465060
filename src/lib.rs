//! # Logmet Protocol
//!
//! Client for the Logmet ingestion protocol: metric samples and structured
//! log entries shipped over TLS to a multi-tenant telemetry service.
//!
//! - **Framing**: length-prefixed binary frames with big-endian integers
//! - **Authentication**: identity + tenant credential handshake per connection
//! - **Sequencing**: per-connection submessage numbering, restarted on reconnect
//! - **Delivery**: every submission waits for an acknowledgment; one
//!   reconnect-and-retry on failure, never an unbounded resend loop
//! - **Liveness**: idle connections dropped by the service are detected
//!   lazily and rebuilt before the next send
//!
//! ## Feature Flags
//!
//! - `transport` (default): TLS session, handshake and liveness probe
//! - `client` (default): high-level [`client::LogmetClient`]
//!
//! ## Modules
//!
//! - [`core`]: Constants, credential and codec errors (always included)
//! - [`codec`]: Payload and frame encoding (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`client`]: Client API (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use logmet_protocol::codec::{encode_metric, wrap, MetricSample, Sequencer, SubmessageKind};
//!
//! let mut sequencer = Sequencer::new();
//! let payload = encode_metric("deadbeef", &MetricSample::at("logmet.test.1", 1.0, 1_476_385_500));
//! let frame = wrap(&[payload], SubmessageKind::Metric, &mut sequencer);
//!
//! assert_eq!(&frame[..2], b"1W");
//! assert_eq!(sequencer.peek(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Frame codec (always included)
pub mod codec;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{LogEntry, MetricSample, Payload, Sequencer, SubmessageKind};
    pub use crate::core::{Credential, FrameError};

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        SessionConfig, SessionState, TlsVerification, TransportError, TransportSession,
    };

    #[cfg(feature = "client")]
    pub use crate::client::{ClientConfig, ClientError, LogmetClient, LogmetClientBuilder};
}

// Re-export commonly used items at crate root
pub use codec::{LogEntry, MetricSample, Payload};
pub use crate::core::{Credential, FrameError};

#[cfg(feature = "client")]
pub use client::{ClientConfig, ClientError, LogmetClient, LogmetClientBuilder};
