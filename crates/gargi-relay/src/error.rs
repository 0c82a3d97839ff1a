//! API errors with HTTP status codes.
//!
//! Everything here is raised before the event stream opens. Once streaming
//! has started, failures travel as a terminal `error` frame instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gargi_core::CoreError;

use crate::http::responses::ErrorResponse;
use crate::provider::ProviderError;

/// Synchronous request failures.
#[derive(Debug)]
pub enum ApiError {
    // Client errors (4xx)
    /// Message missing or blank.
    NoMessage,
    /// Body is not a valid chat request.
    InvalidBody { message: String },

    // Server errors (5xx)
    /// Provider credentials are not configured.
    ProviderUnavailable { message: String },
    /// Failure before any stream byte was written.
    Internal { message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoMessage | ApiError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            ApiError::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::NoMessage => CoreError::EmptyMessage.to_string(),
            ApiError::InvalidBody { message }
            | ApiError::ProviderUnavailable { message }
            | ApiError::Internal { message } => message.clone(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyMessage => ApiError::NoMessage,
            other => ApiError::InvalidBody {
                message: other.to_string(),
            },
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingCredentials { .. } => ApiError::ProviderUnavailable {
                message: err.to_string(),
            },
            other => ApiError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
