//! HTTP client for the relay.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::decoder::FrameDecoder;
use crate::error::ClientError;
use crate::session::{ChatSession, SessionPhase, SessionUpdate};

/// Upper bound for one chat exchange, stream included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the relay's HTTP endpoints.
pub struct RelayClient {
    inner: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    /// Create a new relay client.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the relay is up and return its status text.
    pub async fn health(&self) -> Result<String, ClientError> {
        let url = format!("{}/", self.base_url);
        debug!(url = %url, "Checking relay status");

        let response = self
            .inner
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        Ok(body.status)
    }

    /// Run one chat turn to completion.
    ///
    /// `on_update` is called for every render update. Transport failures end
    /// the turn as `Failed` rather than returning `Err`; only a refused
    /// `begin` is an error. Dropping the future aborts the request, after
    /// which the caller should [`ChatSession::cancel`].
    pub async fn chat<F>(
        &self,
        session: &mut ChatSession,
        input: &str,
        mut on_update: F,
    ) -> Result<SessionPhase, ClientError>
    where
        F: FnMut(&SessionUpdate),
    {
        let (request, pending) = session.begin(input)?;
        on_update(&pending);

        let url = format!("{}/chat", self.base_url);
        debug!(url = %url, history_len = request.history.len(), "Sending chat request");

        let response = match self.inner.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = ClientError::Connection(e.to_string());
                if let Some(update) = session.fail_transport(&err) {
                    on_update(&update);
                }
                return Ok(session.phase());
            }
        };

        if !response.status().is_success() {
            let err = status_error(response).await;
            if let Some(update) = session.fail_transport(&err) {
                on_update(&update);
            }
            return Ok(session.phase());
        }

        let mut body = response.bytes_stream();
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    if let Some(update) = session.fail_transport(&ClientError::Http(e)) {
                        on_update(&update);
                    }
                    return Ok(session.phase());
                }
            };

            for frame in decoder.push(&bytes) {
                if let Some(update) = session.handle(frame) {
                    on_update(&update);
                }
                if !session.is_streaming() {
                    return Ok(session.phase());
                }
            }
        }

        for frame in decoder.finish() {
            if let Some(update) = session.handle(frame) {
                on_update(&update);
            }
        }
        if let Some(update) = session.finish_stream() {
            on_update(&update);
        }
        Ok(session.phase())
    }
}

async fn status_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status {
        status,
        message: error_message(&body),
    }
}

/// Pull the relay's `{"error": ...}` text out of a response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Base URL of a port nothing listens on.
    async fn closed_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error":"No message provided"}"#),
            "No message provided"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "no details");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = RelayClient::new("http://127.0.0.1:5000/").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_refused_connection_fails_the_turn() {
        let client = RelayClient::new(&closed_url().await).unwrap();
        let mut session = ChatSession::new();
        let mut updates = Vec::new();

        let phase = client
            .chat(&mut session, "hi", |update| updates.push(update.clone()))
            .await
            .unwrap();

        assert_eq!(phase, SessionPhase::Failed);
        assert_eq!(updates.first(), Some(&SessionUpdate::Pending));
        assert!(matches!(updates.last(), Some(SessionUpdate::Failed(_))));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_is_refused_before_sending() {
        let client = RelayClient::new(&closed_url().await).unwrap();
        let mut session = ChatSession::new();
        let result = client.chat(&mut session, "  ", |_| {}).await;
        assert!(matches!(result, Err(ClientError::Session(_))));
    }
}
