//! Error types for the Logmet frame codec.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Input data is shorter than the frame layout requires.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// A tag did not match any tag valid at that position.
    #[error("unexpected tag {found:?} (expected {expected})")]
    UnexpectedTag {
        /// What the position allows.
        expected: &'static str,
        /// The two bytes found.
        found: [u8; 2],
    },

    /// A field does not fit its length prefix.
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Actual encoded length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// A required field is empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Bytes remained after the declared submessages were consumed.
    #[error("{0} trailing bytes after wrapper")]
    TrailingBytes(usize),
}
