//! Liveness handler.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};

use crate::http::responses::StatusResponse;
use crate::state::AppState;

/// GET / - report that the relay is up.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: state.status_text.clone(),
    })
}
