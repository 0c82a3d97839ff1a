//! HTTP response types.

use serde::Serialize;

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}
