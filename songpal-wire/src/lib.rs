//! Private wire codec for SongPal device communication
//!
//! This crate provides the JSON envelope layer used to talk to SongPal
//! capable devices. The same envelope shape travels over plain HTTP POST
//! and over a persistent websocket, so the codec is transport agnostic:
//! it turns requests into wire bytes and classifies incoming bodies by
//! shape alone, never by any transport-level media type.

mod codes;
mod envelope;
mod error;

pub use codes::{DeviceErrorCode, ErrorClass};
pub use envelope::{decode_incoming, Incoming, RequestEnvelope};
pub use error::WireError;
