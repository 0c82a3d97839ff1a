//! HTTP handler for the streaming `/chat` endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use gargi_core::{ChatRequest, StreamEvent};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::relay;
use crate::state::AppState;

/// POST /chat - relay one chat turn as a server-sent-events stream.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    json_result: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();

    // Handle JSON parsing errors
    let request = match json_result {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(request_id = %request_id, error = %rejection, "Invalid chat request body");
            return ApiError::InvalidBody {
                message: rejection.body_text(),
            }
            .into_response();
        }
    };

    info!(
        request_id = %request_id,
        message_len = request.message.len(),
        history_len = request.history.len(),
        "Chat request received"
    );

    let span = info_span!("chat", request_id = %request_id);
    match relay::open_relay(&state, request, request_id)
        .instrument(span)
        .await
    {
        Ok(events) => Sse::new(events.map(to_sse_event)).into_response(),
        Err(e) => {
            warn!(request_id = %request_id, status = %e.status(), error = %e.message(), "Chat request rejected");
            e.into_response()
        }
    }
}

fn to_sse_event(event: StreamEvent) -> Result<Event, Infallible> {
    Ok(Event::default().data(event.to_json()))
}
