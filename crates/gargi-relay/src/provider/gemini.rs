//! Gemini `streamGenerateContent` adapter.

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

const PROVIDER: &str = "Gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: InstructionContent<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct InstructionContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

/// Streams replies from `POST {base}/models/{model}:streamGenerateContent`.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    project_id: Option<String>,
}

impl GeminiProvider {
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
        let mut contents: Vec<Content<'_>> = history
            .iter()
            .map(|turn| Content {
                role: turn.role,
                parts: vec![Part { text: &turn.text }],
            })
            .collect();
        contents.push(Content {
            role: RoleVocabulary::GEMINI.user,
            parts: vec![Part { text: user_message }],
        });

        let request = GenerateContentRequest {
            system_instruction: InstructionContent {
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents,
        };
        serde_json::to_vec(&request).map_err(|e| ProviderError::InvalidRequest(e.to_string()))
    }
}

/// Pull the text of one streamed `GenerateContentResponse`.
fn parse_chunk(payload: &str) -> Result<Option<String>, ProviderError> {
    let chunk: GenerateContentChunk = serde_json::from_str(payload)
        .map_err(|e| ProviderError::Upstream(format!("Unreadable {} chunk: {}", PROVIDER, e)))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Upstream(error.message));
    }

    if chunk.candidates.is_empty() {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::Upstream(format!(
                "Request blocked by the provider ({})",
                reason
            )));
        }
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    Ok(if text.is_empty() { None } else { Some(text) })
}

impl ProviderAdapter for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn vocabulary(&self) -> RoleVocabulary {
        RoleVocabulary::GEMINI
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

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        debug!(url = %url, turns = history.len(), "Opening Gemini stream");

        let mut builder = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(project) = &self.project_id {
            builder = builder.header("x-goog-user-project", project);
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
                if let Some(text) = parse_chunk(&payload?)? {
                    yield text;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
