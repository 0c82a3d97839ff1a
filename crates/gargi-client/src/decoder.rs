//! Incremental decoder for the relay's event stream.

use gargi_core::{CoreError, StreamEvent};

/// Turns raw body chunks into stream events.
///
/// Chunks may split frames, lines and UTF-8 sequences anywhere; bytes are
/// held until their line is complete. A frame ends at a blank line and its
/// `data:` lines are joined with `\n`. Comment lines and other fields are
/// ignored.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk and decode every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, CoreError>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, CoreError>> {
        let mut events = Vec::new();
        let line = std::mem::take(&mut self.buffer);
        if !line.is_empty() {
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<Result<StreamEvent, CoreError>> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);

        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<Result<StreamEvent, CoreError>> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(StreamEvent::from_json(&payload))
    }
}
