//! Upstream server-sent-events line reader.

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};

use super::{transport_error, ProviderError};

/// Buffers raw bytes and hands out complete `data:` payloads.
///
/// Works on bytes so multi-byte characters split across network chunks are
/// only decoded once their line is complete.
#[derive(Debug, Default)]
pub(crate) struct SseDataBuffer {
    buffer: Vec<u8>,
}

impl SseDataBuffer {
    /// Add a chunk and return every payload completed by it.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a final line that arrived without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

/// Read a streaming response body as a sequence of `data:` payloads.
pub(crate) fn data_payloads(
    provider: &'static str,
    response: reqwest::Response,
) -> impl Stream<Item = Result<String, ProviderError>> + Send {
    try_stream! {
        let mut chunks = response.bytes_stream();
        let mut buffer = SseDataBuffer::default();

        while let Some(item) = chunks.next().await {
            let bytes = item.map_err(|e| transport_error(provider, e))?;
            for payload in buffer.push(&bytes) {
                yield payload;
            }
        }

        if let Some(payload) = buffer.finish() {
            yield payload;
        }
    }
}
