//! Protocol constants for the Logmet ingestion protocol.
//!
//! Frame tags and field layouts are fixed by the remote service and MUST NOT
//! be changed.

use std::time::Duration;

// =============================================================================
// FRAME TAGS
// =============================================================================

/// Size of every frame and submessage tag.
pub const TAG_SIZE: usize = 2;

/// Identity frame (local address of the connecting client).
pub const TAG_IDENTITY: [u8; TAG_SIZE] = *b"1I";

/// Auth frame (tenant id + token).
pub const TAG_AUTH: [u8; TAG_SIZE] = *b"2T";

/// Wrapper frame (envelope around one or more submessages).
pub const TAG_WRAPPER: [u8; TAG_SIZE] = *b"1W";

/// Metric submessage.
pub const TAG_METRIC: [u8; TAG_SIZE] = *b"1M";

/// Log submessage.
pub const TAG_LOG: [u8; TAG_SIZE] = *b"1D";

/// Acknowledgment frame.
pub const TAG_ACK: [u8; TAG_SIZE] = *b"1A";

// =============================================================================
// FIELD SIZES
// =============================================================================

/// Width of the big-endian integers used for counts, lengths and sequences.
pub const U32_SIZE: usize = 4;

/// Longest value a 1-byte length prefix can describe.
pub const MAX_SHORT_FIELD_LEN: usize = u8::MAX as usize;

/// Wrapper header size (tag + submessage count).
pub const WRAPPER_HEADER_SIZE: usize = TAG_SIZE + U32_SIZE;

/// Submessage header size (tag + sequence number).
pub const SUBMESSAGE_HEADER_SIZE: usize = TAG_SIZE + U32_SIZE;

/// Read buffer size while waiting for an ack. Anything past the tag is ignored.
pub const ACK_READ_CHUNK: usize = 512;

// =============================================================================
// LOG ENTRY FIELDS
// =============================================================================

/// Reserved field carrying the tenant id; the service rejects entries without it.
pub const TENANT_FIELD: &str = "ALCH_TENANT_ID";

/// Field a plain-text log message is stored under.
pub const MESSAGE_FIELD: &str = "message";

// =============================================================================
// SEQUENCING
// =============================================================================

/// First sequence number issued on a fresh session.
pub const INITIAL_SEQUENCE: u32 = 1;

// =============================================================================
// TIMING
// =============================================================================

/// Default timeout applied to every network operation.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(20);

/// Time given to in-flight acknowledgments after the write half is shut down.
pub const CLOSE_DRAIN_DELAY: Duration = Duration::from_millis(100);

// =============================================================================
// DELIVERY
// =============================================================================

/// Attempts per emit call: the first send plus one rebuild-and-retry.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 2;

// =============================================================================
// WELL-KNOWN ENDPOINTS
// =============================================================================

/// Default port of the metrics ingestion endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9095;

/// Default port of the logs ingestion endpoint.
pub const DEFAULT_LOGS_PORT: u16 = 9091;
