//! Relay configuration.

use std::time::Duration;

use crate::provider::ProviderKind;
use crate::sentiment::SentimentStrategy;

/// Default marker returned by `GET /`.
pub const DEFAULT_STATUS_TEXT: &str = "Gargi AI backend live ✅";

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub bind_addr: String,

    /// Text reported by the liveness endpoint.
    pub status_text: String,

    /// Upstream AI provider settings.
    pub provider: ProviderConfig,

    /// Sentiment classification settings.
    pub sentiment: SentimentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            status_text: DEFAULT_STATUS_TEXT.to_string(),
            provider: ProviderConfig::default(),
            sentiment: SentimentConfig::default(),
        }
    }
}

/// Upstream AI provider settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Which provider adapter to use for the lifetime of the process.
    pub kind: ProviderKind,

    /// Provider API key. Checked on every request, not at startup.
    pub api_key: Option<String>,

    /// Optional project/tenant id forwarded to the provider.
    pub project_id: Option<String>,

    /// Model override.
    pub model: Option<String>,

    /// Base URL override (tests, proxies).
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Gemini,
            api_key: None,
            project_id: None,
            model: None,
            base_url: None,
        }
    }
}

impl ProviderConfig {
    /// Model to request, falling back to the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// Base URL to call, falling back to the provider default.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }
}

/// Sentiment classification settings.
#[derive(Debug, Clone)]
pub struct SentimentConfig {
    /// Classifier strategy, fixed at process start.
    pub strategy: SentimentStrategy,

    /// Endpoint of the statistical classifier.
    pub classifier_url: Option<String>,

    /// Bearer token for the statistical classifier.
    pub classifier_token: Option<String>,

    /// Use the keyword heuristic when the statistical classifier cannot start.
    pub keyword_fallback: bool,

    /// Upper bound for a single classification call.
    pub timeout: Duration,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            strategy: SentimentStrategy::Keyword,
            classifier_url: None,
            classifier_token: None,
            keyword_fallback: true,
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Pick the API key: an explicit value first, then the provider's own
/// environment variables. Blank values count as missing.
pub fn resolve_api_key(kind: ProviderKind, explicit: Option<String>) -> Option<String> {
    explicit
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            kind.key_env_vars()
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|key| !key.trim().is_empty())
        })
}
