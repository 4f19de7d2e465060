//! Logmet Protocol - Frame Codec
//!
//! Pure byte-level encoding with no I/O:
//!
//! - **Payloads**: [`MetricSample`] lines and [`LogEntry`] key/value bodies,
//!   unified under the [`Payload`] variant
//! - **Frames**: identity, auth and wrapper frames, ack recognition
//! - **Sequencing**: [`Sequencer`] numbering submessages within a session

pub mod frame;
pub mod payload;
mod sequence;

pub use frame::{
    auth_frame, identity_frame, is_ack, wrap, Submessage, SubmessageKind, WrapperFrame,
};
pub use payload::{encode_log_entry, encode_metric, LogEntry, MetricSample, Payload};
pub use sequence::Sequencer;
