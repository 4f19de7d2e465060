//! Tenant credential presented during the authentication handshake.

use std::fmt;

use zeroize::Zeroizing;

use super::constants::MAX_SHORT_FIELD_LEN;
use super::error::FrameError;

/// Tenant id and logging token issued out of band.
///
/// Both fields travel behind a 1-byte length prefix, so they are checked
/// against that limit here rather than at handshake time. The token is wiped
/// from memory on drop and never printed.
#[derive(Clone)]
pub struct Credential {
    space_id: String,
    token: Zeroizing<String>,
}

impl Credential {
    /// Create a credential, validating both fields.
    pub fn new(space_id: impl Into<String>, token: impl Into<String>) -> Result<Self, FrameError> {
        let space_id = space_id.into();
        let token = Zeroizing::new(token.into());

        check_short_field("space id", &space_id)?;
        check_short_field("token", &token)?;

        Ok(Self { space_id, token })
    }

    /// The tenant id (`spaceId`).
    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    /// The logging token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("space_id", &self.space_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn check_short_field(field: &'static str, value: &str) -> Result<(), FrameError> {
    if value.is_empty() {
        return Err(FrameError::EmptyField(field));
    }
    if value.len() > MAX_SHORT_FIELD_LEN {
        return Err(FrameError::FieldTooLong {
            field,
            len: value.len(),
            max: MAX_SHORT_FIELD_LEN,
        });
    }
    Ok(())
}
