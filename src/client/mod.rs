//! Logmet Protocol - Client Library
//!
//! High-level API for Logmet clients.

#[allow(clippy::module_inception)]
mod client;
mod error;
mod pipeline;

pub use client::*;
pub use error::ClientError;
pub use pipeline::DeliveryPipeline;
