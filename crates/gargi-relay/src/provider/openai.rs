//! OpenAI chat completions adapter.

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    configured_key, sse, status_error, transport_error, FragmentStream, ProviderAdapter,
    ProviderError,
};
use crate::config::ProviderConfig;
use crate::history::{ProviderTurn, RoleVocabulary};

const PROVIDER: &str = "OpenAI";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

/// Streams replies from `POST {base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    project_id: Option<String>,
}

impl OpenAiProvider {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
        }
    }

    fn build_body(
        &self,
        history: &[ProviderTurn],
        user_message: &str,
        system_instruction: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ApiMessage {
            role: "system",
            content: system_instruction,
        });
        messages.extend(history.iter().map(|turn| ApiMessage {
            role: turn.role,
            content: &turn.text,
        }));
        messages.push(ApiMessage {
            role: RoleVocabulary::OPENAI.user,
            content: user_message,
        });

        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        serde_json::to_vec(&request).map_err(|e| ProviderError::InvalidRequest(e.to_string()))
    }
}

/// Pull the text delta out of one stream chunk.
fn parse_delta(payload: &str) -> Result<Option<String>, ProviderError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| ProviderError::Upstream(format!("Unreadable {} chunk: {}", PROVIDER, e)))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Upstream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

impl ProviderAdapter for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn vocabulary(&self) -> RoleVocabulary {
        RoleVocabulary::OPENAI
    }

    fn is_configured(&self) -> bool {
        configured_key(&self.api_key, PROVIDER).is_ok()
    }

    fn stream_reply(
        &self,
        history: &[ProviderTurn],
        user_message: &str,
        system_instruction: &str,
    ) -> Result<FragmentStream, ProviderError> {
        let api_key = configured_key(&self.api_key, PROVIDER)?;
        let body = self.build_body(history, user_message, system_instruction)?;

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, turns = history.len(), "Opening OpenAI stream");

        let mut builder = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(project) = &self.project_id {
            builder = builder.header("OpenAI-Project", project);
        }

        let stream = try_stream! {
            let response = builder
                .send()
                .await
                .map_err(|e| transport_error(PROVIDER, e))?;
            if !response.status().is_success() {
                Err::<(), _>(status_error(PROVIDER, response).await)?;
                return;
            }

            let mut payloads = Box::pin(sse::data_payloads(PROVIDER, response));
            while let Some(payload) = payloads.next().await {
                let payload = payload?;
                if payload == "[DONE]" {
                    break;
                }
                if let Some(text) = parse_delta(&payload)? {
                    yield text;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    fn provider(api_key: Option<&str>) -> OpenAiProvider {
        let config = ProviderConfig {
            kind: ProviderKind::OpenAi,
            api_key: api_key.map(str::to_string),
            ..ProviderConfig::default()
        };
        OpenAiProvider::new(Client::new(), &config)
    }

    #[test]
    fn test_body_layout() {
        let history = vec![
            ProviderTurn { role: "user", text: "hi".into() },
            ProviderTurn { role: "assistant", text: "hello".into() },
        ];
        let body = provider(Some("sk")).build_body(&history, "again", "be nice").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["stream"], true);
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be nice");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "again");
    }

    #[test]
    fn test_missing_key_fails_before_streaming() {
        let result = provider(None).stream_reply(&[], "hi", "sys");
        assert!(matches!(
            result,
            Err(ProviderError::MissingCredentials { provider: "OpenAI" })
        ));
    }

    #[test]
    fn test_is_configured() {
        assert!(!provider(None).is_configured());
        assert!(!provider(Some("  ")).is_configured());
        assert!(provider(Some("sk-test")).is_configured());
    }

    #[test]
    fn test_parse_delta() {
        let payload = r#"{"id":"c1","model":"gpt-4o-mini","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_delta(payload).unwrap().as_deref(), Some("Hel"));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta(role_only).unwrap(), None);

        let finish = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_delta(finish).unwrap(), None);
    }

    #[test]
    fn test_parse_delta_in_band_error() {
        let payload = r#"{"error":{"message":"server overloaded"}}"#;
        assert_eq!(
            parse_delta(payload),
            Err(ProviderError::Upstream("server overloaded".into()))
        );
        assert!(parse_delta("not json").is_err());
    }
}
