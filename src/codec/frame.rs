//! Frame encoding and decoding for the Logmet wire protocol.
//!
//! All multi-byte integers are big-endian.
//!
//! ```text
//! Identity   "1I" | len (1) | local address
//! Auth       "2T" | len (1) | tenant id | len (1) | token
//! Wrapper    "1W" | count (4) | submessage...
//! Submessage "1M" or "1D" | sequence (4) | payload length (4) | payload
//! Ack        "1A" | ignored trailer
//! ```

use crate::core::constants::{
    MAX_SHORT_FIELD_LEN, SUBMESSAGE_HEADER_SIZE, TAG_ACK, TAG_AUTH, TAG_IDENTITY, TAG_LOG,
    TAG_METRIC, TAG_SIZE, TAG_WRAPPER, U32_SIZE, WRAPPER_HEADER_SIZE,
};
use crate::core::{Credential, FrameError};

use super::sequence::Sequencer;

/// Kind of submessage carried inside a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmessageKind {
    /// Metric line (`1M`).
    Metric,
    /// Log key/value entry (`1D`).
    Log,
}

impl SubmessageKind {
    /// Wire tag for this kind.
    pub fn tag(self) -> [u8; TAG_SIZE] {
        match self {
            Self::Metric => TAG_METRIC,
            Self::Log => TAG_LOG,
        }
    }

    /// Parse a submessage tag.
    pub fn from_tag(tag: [u8; TAG_SIZE]) -> Option<Self> {
        match tag {
            TAG_METRIC => Some(Self::Metric),
            TAG_LOG => Some(Self::Log),
            _ => None,
        }
    }
}

/// Encode the identity frame announcing the client's local address.
pub fn identity_frame(identity: &str) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::with_capacity(TAG_SIZE + 1 + identity.len());
    buf.extend_from_slice(&TAG_IDENTITY);
    put_short_field(&mut buf, "identity", identity)?;
    Ok(buf)
}

/// Encode the auth frame carrying tenant id and token.
pub fn auth_frame(credential: &Credential) -> Result<Vec<u8>, FrameError> {
    let space_id = credential.space_id();
    let token = credential.token();

    let mut buf = Vec::with_capacity(TAG_SIZE + 2 + space_id.len() + token.len());
    buf.extend_from_slice(&TAG_AUTH);
    put_short_field(&mut buf, "space id", space_id)?;
    put_short_field(&mut buf, "token", token)?;
    Ok(buf)
}

/// Build a wrapper frame around already length-prefixed payloads.
///
/// Each payload consumes one sequence number, in order.
pub fn wrap<P: AsRef<[u8]>>(payloads: &[P], kind: SubmessageKind, sequencer: &mut Sequencer) -> Vec<u8> {
    let body_len: usize = payloads
        .iter()
        .map(|p| SUBMESSAGE_HEADER_SIZE + p.as_ref().len())
        .sum();

    let mut buf = Vec::with_capacity(WRAPPER_HEADER_SIZE + body_len);
    buf.extend_from_slice(&TAG_WRAPPER);
    buf.extend_from_slice(&(payloads.len() as u32).to_be_bytes());
    for payload in payloads {
        buf.extend_from_slice(&kind.tag());
        buf.extend_from_slice(&sequencer.next().to_be_bytes());
        buf.extend_from_slice(payload.as_ref());
    }
    buf
}

/// Whether `bytes` start with the acknowledgment tag.
pub fn is_ack(bytes: &[u8]) -> bool {
    bytes.starts_with(&TAG_ACK)
}

/// Printable rendering of raw frame bytes for logs.
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

/// One decoded submessage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submessage {
    /// Metric or log.
    pub kind: SubmessageKind,
    /// Sequence number issued by the sender.
    pub sequence: u32,
    /// Payload bytes including their 4-byte length prefix.
    pub payload: Vec<u8>,
}

impl Submessage {
    /// Payload bytes without the length prefix.
    pub fn body(&self) -> &[u8] {
        self.payload.get(U32_SIZE..).unwrap_or(&[])
    }
}

/// A decoded wrapper frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperFrame {
    /// Submessages in wire order.
    pub submessages: Vec<Submessage>,
}

impl WrapperFrame {
    /// Decode a complete wrapper; trailing bytes are an error.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let (frame, consumed) = Self::decode_with_length(data)?;
        if consumed != data.len() {
            return Err(FrameError::TrailingBytes(data.len() - consumed));
        }
        Ok(frame)
    }

    /// Decode a wrapper from the front of `data`, returning bytes consumed.
    ///
    /// Returns [`FrameError::TooShort`] while the buffer holds a partial frame,
    /// so stream readers can keep accumulating.
    pub fn decode_with_length(data: &[u8]) -> Result<(Self, usize), FrameError> {
        let tag = read_tag(data, 0)?;
        if tag != TAG_WRAPPER {
            return Err(FrameError::UnexpectedTag {
                expected: "wrapper",
                found: tag,
            });
        }
        let count = read_u32(data, TAG_SIZE)? as usize;

        let mut pos = WRAPPER_HEADER_SIZE;
        let mut submessages = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let tag = read_tag(data, pos)?;
            let kind = SubmessageKind::from_tag(tag).ok_or(FrameError::UnexpectedTag {
                expected: "metric or log submessage",
                found: tag,
            })?;
            let sequence = read_u32(data, pos + TAG_SIZE)?;
            pos += SUBMESSAGE_HEADER_SIZE;

            let len = read_u32(data, pos)? as usize;
            let end = pos + U32_SIZE + len;
            if data.len() < end {
                return Err(FrameError::TooShort {
                    expected: end,
                    actual: data.len(),
                });
            }
            submessages.push(Submessage {
                kind,
                sequence,
                payload: data[pos..end].to_vec(),
            });
            pos = end;
        }

        Ok((Self { submessages }, pos))
    }
}

fn put_short_field(buf: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), FrameError> {
    if value.len() > MAX_SHORT_FIELD_LEN {
        return Err(FrameError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_SHORT_FIELD_LEN,
        });
    }
    buf.push(value.len() as u8);
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn read_tag(data: &[u8], at: usize) -> Result<[u8; TAG_SIZE], FrameError> {
    data.get(at..at + TAG_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(FrameError::TooShort {
            expected: at + TAG_SIZE,
            actual: data.len(),
        })
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, FrameError> {
    data.get(at..at + U32_SIZE)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or(FrameError::TooShort {
            expected: at + U32_SIZE,
            actual: data.len(),
        })
}
