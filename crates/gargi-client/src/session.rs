//! Chat session state machine.
//!
//! A session owns the local conversation history and the reply currently
//! being streamed. Phases move `Idle -> Streaming -> {Completed, Failed}`;
//! a finished turn can be followed by a new `begin`.

use gargi_core::{ChatRequest, ChatRole, ChatTurn, CoreError, StreamEvent};
use tracing::{debug, warn};

use crate::error::{ClientError, SessionError};

/// Shown while waiting for the first fragment.
pub const PENDING_TEXT: &str = "Thinking...";

/// Appended to a reply that is still streaming.
pub const CURSOR: &str = " ▌";

const NO_READABLE_REPLY: &str = "The reply could not be read.";
const STREAM_CLOSED: &str = "Connection closed before the reply finished.";

/// Where the session is in its current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// A change the UI should render for the assistant's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Request sent, nothing received yet.
    Pending,
    /// Reply so far.
    Progress(String),
    /// Complete reply.
    Final(String),
    /// Turn failed with a user-visible message.
    Failed(String),
}

impl SessionUpdate {
    /// Text to display for this update.
    pub fn render(&self) -> String {
        match self {
            SessionUpdate::Pending => PENDING_TEXT.to_string(),
            SessionUpdate::Progress(text) => format!("{}{}", text, CURSOR),
            SessionUpdate::Final(text) => text.clone(),
            SessionUpdate::Failed(message) => format!("Error: {}", message),
        }
    }
}

/// Local conversation plus the in-flight reply.
#[derive(Debug)]
pub struct ChatSession {
    history: Vec<ChatTurn>,
    phase: SessionPhase,
    accumulator: String,
    content_events: usize,
    malformed_frames: usize,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            phase: SessionPhase::Idle,
            accumulator: String::new(),
            content_events: 0,
            malformed_frames: 0,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Start a turn.
    ///
    /// Appends the user turn and returns the request to send, whose history
    /// holds every turn before this one.
    pub fn begin(&mut self, input: &str) -> Result<(ChatRequest, SessionUpdate), SessionError> {
        if self.is_streaming() {
            return Err(SessionError::Busy);
        }
        let message = input.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let request = ChatRequest::new(message, self.history.clone());
        self.history.push(ChatTurn::user(message));
        self.phase = SessionPhase::Streaming;
        self.accumulator.clear();
        self.content_events = 0;
        self.malformed_frames = 0;

        debug!(history_len = request.history.len(), "Chat turn started");
        Ok((request, SessionUpdate::Pending))
    }

    /// Feed one decoded frame.
    pub fn handle(&mut self, frame: Result<StreamEvent, CoreError>) -> Option<SessionUpdate> {
        match frame {
            Ok(event) => self.apply(event),
            Err(err) => self.malformed(&err),
        }
    }

    /// Apply a stream event. Events outside a streaming turn are ignored.
    pub fn apply(&mut self, event: StreamEvent) -> Option<SessionUpdate> {
        if !self.is_streaming() {
            debug!(event = ?event, "Ignoring event outside a streaming turn");
            return None;
        }

        match event {
            StreamEvent::Content { text } => {
                self.content_events += 1;
                self.accumulator.push_str(&text);
                Some(SessionUpdate::Progress(self.accumulator.clone()))
            }
            StreamEvent::Stop => {
                if self.content_events == 0 && self.malformed_frames > 0 {
                    return Some(self.fail(NO_READABLE_REPLY));
                }
                Some(self.complete())
            }
            StreamEvent::Error { message } => Some(self.fail(&message)),
        }
    }

    /// Record a frame that could not be decoded. Skipped, never fatal by itself.
    pub fn malformed(&mut self, err: &CoreError) -> Option<SessionUpdate> {
        if self.is_streaming() {
            self.malformed_frames += 1;
            warn!(error = %err, "Skipping malformed frame");
        }
        None
    }

    /// Fail the turn because the transport broke.
    pub fn fail_transport(&mut self, err: &ClientError) -> Option<SessionUpdate> {
        if !self.is_streaming() {
            return None;
        }
        warn!(error = %err, "Chat transport failed");
        Some(self.fail(&err.to_string()))
    }

    /// The body ended; a turn still streaming never got its terminal event.
    pub fn finish_stream(&mut self) -> Option<SessionUpdate> {
        if !self.is_streaming() {
            return None;
        }
        warn!(fragments = self.content_events, "Stream closed without a terminal event");
        Some(self.fail(STREAM_CLOSED))
    }

    /// Abandon the in-flight turn. Returns whether anything was cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.rollback();
        self.phase = SessionPhase::Idle;
        debug!("Chat turn cancelled");
        true
    }

    /// Forget the conversation.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        if self.is_streaming() {
            return Err(SessionError::Busy);
        }
        self.history.clear();
        self.phase = SessionPhase::Idle;
        Ok(())
    }

    fn complete(&mut self) -> SessionUpdate {
        let text = std::mem::take(&mut self.accumulator);
        if !text.is_empty() {
            self.history.push(ChatTurn::assistant(text.clone()));
        }
        self.phase = SessionPhase::Completed;
        debug!(reply_len = text.len(), "Chat turn completed");
        SessionUpdate::Final(text)
    }

    fn fail(&mut self, message: &str) -> SessionUpdate {
        self.rollback();
        self.phase = SessionPhase::Failed;
        SessionUpdate::Failed(message.to_string())
    }

    fn rollback(&mut self) {
        self.accumulator.clear();
        if matches!(self.history.last(), Some(turn) if turn.role == ChatRole::User) {
            self.history.pop();
        }
    }
}
