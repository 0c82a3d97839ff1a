//! Error types for the relay client.

use thiserror::Error;

/// Errors that can occur when talking to the relay.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to reach the relay.
    #[error("connection failed: {0}")]
    Connection(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Relay answered with a non-success status.
    #[error("relay returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The session refused the operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Operations a chat session refuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyInput,

    #[error("a reply is still streaming")]
    Busy,
}
