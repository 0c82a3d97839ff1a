//! Shared application state.

use std::sync::Arc;

use crate::config::Config;
use crate::provider::{build_provider, ProviderAdapter, ProviderError};
use crate::sentiment::SentimentClassifier;

/// State shared by every request.
///
/// Nothing in here is per-request: the provider adapter is immutable and the
/// classifier only caches its lazily resolved backend.
pub struct AppState {
    /// Provider adapter selected at startup.
    pub provider: Arc<dyn ProviderAdapter>,

    /// Process-wide sentiment classifier.
    pub sentiment: SentimentClassifier,

    /// Text reported by `GET /`.
    pub status_text: String,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        sentiment: SentimentClassifier,
        status_text: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            sentiment,
            status_text: status_text.into(),
        })
    }

    /// Build state from configuration.
    pub fn from_config(config: &Config) -> Result<Arc<Self>, ProviderError> {
        let provider = build_provider(&config.provider)?;
        let sentiment = SentimentClassifier::new(config.sentiment.clone());
        Ok(Self::new(provider, sentiment, config.status_text.clone()))
    }
}
