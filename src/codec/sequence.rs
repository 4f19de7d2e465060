//! Per-session submessage sequencing.

use crate::core::constants::INITIAL_SEQUENCE;

/// Issues submessage sequence numbers for one live session.
///
/// Numbering starts at 1 and must restart at 1 whenever the session is
/// rebuilt; the service tracks sequences per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequencer {
    next: u32,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Create a sequencer positioned at the initial sequence number.
    pub fn new() -> Self {
        Self {
            next: INITIAL_SEQUENCE,
        }
    }

    /// Return the current sequence number and advance.
    ///
    /// Numbers strictly increase until `u32::MAX`, after which numbering
    /// restarts at 1; that takes over four billion acknowledged round trips
    /// on a single connection.
    pub fn next(&mut self) -> u32 {
        let seq = self.next;
        // Wrap to the initial value rather than to zero.
        self.next = self.next.checked_add(1).unwrap_or(INITIAL_SEQUENCE);
        seq
    }

    /// The number the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Restart numbering, as after a reconnect.
    pub fn reset(&mut self) {
        self.next = INITIAL_SEQUENCE;
    }
}
