//! Gargi Core Domain Types
//!
//! This crate contains the types shared by the relay and its clients:
//! - Chat turns and the request body sent to the relay
//! - Stream events and their `data: <json>` wire framing
//! - Sentiment labels
//!
//! Nothing here touches the network or an async runtime.

pub mod chat;
pub mod error;
pub mod event;
pub mod sentiment;

// Re-export commonly used types
pub use chat::{ChatRequest, ChatRole, ChatTurn};
pub use error::CoreError;
pub use event::StreamEvent;
pub use sentiment::SentimentLabel;
