//! Stream events relayed from the provider to the client.
//!
//! On the wire each event is one server-sent-events frame, `data: <json>\n\n`,
//! where `<json>` is one of:
//!
//! ```text
//! {"content": "<fragment>"}
//! {"type": "stop"}
//! {"type": "error", "content": "<message>"}
//! ```

use serde::Deserialize;
use serde_json::json;

use crate::error::CoreError;

/// One event of a relayed reply stream.
///
/// A well-formed stream is zero or more `Content` events followed by exactly
/// one terminal event (`Stop` or `Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Partial reply text, concatenated in emission order.
    Content { text: String },
    /// Reply finished normally.
    Stop,
    /// Reply failed; no `Stop` follows.
    Error { message: String },
}

/// Loose shape accepted when decoding a frame payload.
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl StreamEvent {
    /// Create a content event.
    pub fn content(text: impl Into<String>) -> Self {
        StreamEvent::Content { text: text.into() }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Content { .. })
    }

    /// JSON payload of the frame.
    pub fn to_json(&self) -> String {
        let value = match self {
            StreamEvent::Content { text } => json!({ "content": text }),
            StreamEvent::Stop => json!({ "type": "stop" }),
            StreamEvent::Error { message } => json!({ "type": "error", "content": message }),
        };
        value.to_string()
    }

    /// Full wire frame including the `data: ` prefix and blank-line terminator.
    pub fn to_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }

    /// Decode the JSON payload of a `data:` line.
    pub fn from_json(data: &str) -> Result<Self, CoreError> {
        let frame: WireFrame =
            serde_json::from_str(data).map_err(|e| CoreError::FrameParse(e.to_string()))?;

        match (frame.kind.as_deref(), frame.content) {
            (Some("stop"), _) => Ok(StreamEvent::Stop),
            (Some("error"), content) => Ok(StreamEvent::Error {
                message: content.unwrap_or_else(|| "Unknown error".to_string()),
            }),
            (Some(other), _) => Err(CoreError::FrameParse(format!(
                "unknown event type '{}'",
                other
            ))),
            (None, Some(text)) => Ok(StreamEvent::Content { text }),
            (None, None) => Err(CoreError::FrameParse(
                "frame carries neither type nor content".to_string(),
            )),
        }
    }
}
