//! AI provider adapters.
//!
//! Every provider sits behind [`ProviderAdapter`]. The relay picks one
//! implementation at startup from [`ProviderKind`] and never branches on the
//! provider again.

use std::pin::Pin;
use std::sync::Arc;

use clap::ValueEnum;
use futures_util::Stream;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::history::{ProviderTurn, RoleVocabulary};

mod gemini;
mod openai;
mod sse;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

/// Lazy, finite, non-restartable sequence of reply fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Errors surfaced by provider adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No API key configured; raised before any network call.
    #[error("{provider} API key is not configured")]
    MissingCredentials { provider: &'static str },

    /// The provider rejected the configured key.
    #[error("Provider rejected the API key: {0}")]
    Authentication(String),

    /// The upstream request could not be built.
    #[error("Could not build provider request: {0}")]
    InvalidRequest(String),

    /// Transport, status or decoding failure talking to the provider.
    #[error("{0}")]
    Upstream(String),
}

impl ProviderError {
    /// Whether the failure is about credentials and must not be shown verbatim.
    pub fn is_credential_related(&self) -> bool {
        match self {
            ProviderError::MissingCredentials { .. } | ProviderError::Authentication(_) => true,
            ProviderError::InvalidRequest(_) => false,
            ProviderError::Upstream(message) => mentions_api_key(message),
        }
    }
}

fn mentions_api_key(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("api key") || lower.contains("api_key") || lower.contains("apikey")
}

/// Strategy interface over generative-AI providers.
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Role names this provider expects in history.
    fn vocabulary(&self) -> RoleVocabulary;

    /// Whether credentials are present. No network call.
    fn is_configured(&self) -> bool;

    /// Start a streamed reply.
    ///
    /// Fails synchronously with [`ProviderError::MissingCredentials`] when no
    /// key is configured. Otherwise returns a stream that contacts the provider
    /// on first poll and reports upstream failures as `Err` items.
    fn stream_reply(
        &self,
        history: &[ProviderTurn],
        user_message: &str,
        system_instruction: &str,
    ) -> Result<FragmentStream, ProviderError>;
}

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "gemini")]
    Gemini,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Provider-specific environment variables consulted for the API key.
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the adapter selected by configuration.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

    let provider: Arc<dyn ProviderAdapter> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(client, config)),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(client, config)),
    };
    Ok(provider)
}

/// Error envelope shared by OpenAI and Gemini: `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty())
}

/// Turn a non-success upstream response into a typed error.
async fn status_error(provider: &'static str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| format!("{} request failed with status {}", provider, status));

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) || mentions_api_key(&message)
    {
        ProviderError::Authentication(message)
    } else {
        ProviderError::Upstream(message)
    }
}

fn transport_error(provider: &'static str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Upstream(format!("{} request timed out", provider))
    } else {
        ProviderError::Upstream(format!("{} request failed: {}", provider, err))
    }
}

fn configured_key(api_key: &Option<String>, provider: &'static str) -> Result<String, ProviderError> {
    api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(ProviderError::MissingCredentials { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_classification() {
        assert!(ProviderError::MissingCredentials { provider: "OpenAI" }.is_credential_related());
        assert!(ProviderError::Authentication("nope".into()).is_credential_related());
        assert!(ProviderError::Upstream("API key not valid. Please pass a valid API key.".into())
            .is_credential_related());
        assert!(!ProviderError::Upstream("model overloaded".into()).is_credential_related());
        assert!(!ProviderError::InvalidRequest("bad".into()).is_credential_related());
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(extract_error_message(body).as_deref(), Some("API key not valid."));
        assert_eq!(extract_error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_configured_key() {
        assert_eq!(
            configured_key(&None, "Gemini"),
            Err(ProviderError::MissingCredentials { provider: "Gemini" })
        );
        assert!(configured_key(&Some("  ".into()), "Gemini").is_err());
        assert_eq!(configured_key(&Some(" k ".into()), "Gemini").unwrap(), "k");
    }

    #[test]
    fn test_build_provider_selects_kind() {
        let config = ProviderConfig {
            kind: ProviderKind::OpenAi,
            ..ProviderConfig::default()
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.vocabulary(), RoleVocabulary::OPENAI);

        let provider = build_provider(&ProviderConfig::default()).unwrap();
        assert_eq!(provider.name(), "Gemini");
        assert_eq!(provider.vocabulary(), RoleVocabulary::GEMINI);
    }
}
