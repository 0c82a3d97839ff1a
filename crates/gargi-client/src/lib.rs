//! Client library for the Gargi relay.
//!
//! Decodes the relay's server-sent-events stream and keeps the local
//! conversation consistent while a reply is streaming.

pub mod client;
pub mod decoder;
pub mod error;
pub mod session;

pub use client::RelayClient;
pub use decoder::FrameDecoder;
pub use error::{ClientError, SessionError};
pub use session::{ChatSession, SessionPhase, SessionUpdate};
