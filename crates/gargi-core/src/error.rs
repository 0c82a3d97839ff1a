//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Gargi.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Chat request carried no usable message.
    #[error("No message provided")]
    EmptyMessage,

    /// A wire frame could not be decoded as any known stream event.
    #[error("Malformed frame: {0}")]
    FrameParse(String),
}
