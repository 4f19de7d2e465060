//! Core types shared by every layer: protocol constants, the tenant
//! credential and codec errors.

pub mod constants;
mod credential;
mod error;

pub use credential::Credential;
pub use error::FrameError;
