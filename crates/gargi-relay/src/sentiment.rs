//! Sentiment classification for incoming messages.
//!
//! Classification is best effort. [`SentimentClassifier::classify`] always
//! returns a label; every failure inside a backend, including a timeout or a
//! panic, degrades to [`SentimentLabel::Unknown`].
//!
//! The backend is resolved lazily on the first request and cached for the
//! rest of the process. When the statistical backend cannot start, the
//! keyword heuristic takes over (if enabled) or classification is skipped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use futures_util::FutureExt;
use gargi_core::SentimentLabel;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::SentimentConfig;

/// Classifier strategy, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SentimentStrategy {
    /// Remote text-classification model.
    Statistical,
    /// Fixed positive/negative word lists.
    Keyword,
    /// Skip classification; every message is `unknown`.
    Disabled,
}

/// Errors raised inside a classifier backend. Never leave this module.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Backend is missing required configuration.
    #[error("classifier not configured: {0}")]
    NotConfigured(String),

    /// HTTP error talking to the classifier.
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Classifier answered with something unusable.
    #[error("unexpected classifier response: {0}")]
    Response(String),
}

/// A text classification capability.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Classify one message.
    async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassifierError>;
}

// ============================================================================
// Keyword heuristic
// ============================================================================

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "awesome", "amazing", "excellent", "fantastic", "wonderful", "love",
    "happy", "glad", "thank", "nice", "cool", "perfect", "brilliant", "excited",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "horrible", "worst", "hate", "sad", "angry", "upset",
    "annoyed", "frustrat", "disappoint", "broken", "not working", "useless", "stupid",
];

/// Keyword-presence heuristic.
///
/// Case-insensitive substring match against fixed word lists. The word that
/// occurs earliest in the text decides; a tie or no match is `NEUTRAL`.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    positive: &'static [&'static str],
    negative: &'static [&'static str],
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            positive: POSITIVE_WORDS,
            negative: NEGATIVE_WORDS,
        }
    }
}

impl KeywordClassifier {
    pub fn label(&self, text: &str) -> SentimentLabel {
        let lower = text.to_lowercase();
        let earliest = |words: &[&str]| words.iter().filter_map(|w| lower.find(w)).min();

        match (earliest(self.positive), earliest(self.negative)) {
            (Some(pos), Some(neg)) if pos < neg => SentimentLabel::Positive,
            (Some(pos), Some(neg)) if neg < pos => SentimentLabel::Negative,
            (Some(_), None) => SentimentLabel::Positive,
            (None, Some(_)) => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }
}

#[async_trait]
impl SentimentBackend for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassifierError> {
        Ok(self.label(text))
    }
}

// ============================================================================
// Statistical classifier (HTTP inference endpoint)
// ============================================================================

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Inference endpoints answer either one list per input or a flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

/// Remote text-classification model behind an inference endpoint.
///
/// Sends `{"inputs": text}` and picks the highest-scoring label.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    url: reqwest::Url,
    token: Option<String>,
}

impl HttpClassifier {
    pub fn new(
        url: Option<&str>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ClassifierError::NotConfigured("no classifier URL".to_string()))?;
        let url = reqwest::Url::parse(url)
            .map_err(|e| ClassifierError::NotConfigured(format!("invalid URL '{}': {}", url, e)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, url, token })
    }
}

fn best_label(response: InferenceResponse) -> Option<SentimentLabel> {
    let scores = match response {
        InferenceResponse::Nested(lists) => lists.into_iter().next().unwrap_or_default(),
        InferenceResponse::Flat(list) => list,
    };
    scores
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|best| SentimentLabel::from_label(&best.label))
}

#[async_trait]
impl SentimentBackend for HttpClassifier {
    fn name(&self) -> &'static str {
        "statistical"
    }

    async fn classify(&self, text: &str) -> Result<SentimentLabel, ClassifierError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({ "inputs": text }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Response(format!(
                "status {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let parsed: InferenceResponse =
            serde_json::from_str(&body).map_err(|e| ClassifierError::Response(e.to_string()))?;
        best_label(parsed).ok_or_else(|| ClassifierError::Response("no labels".to_string()))
    }
}

// ============================================================================
// Classifier adapter
// ============================================================================

/// Process-wide classifier with lazy, once-only backend resolution.
pub struct SentimentClassifier {
    config: SentimentConfig,
    backend: OnceCell<Option<Arc<dyn SentimentBackend>>>,
}

impl SentimentClassifier {
    /// Create a classifier that resolves its backend on first use.
    pub fn new(config: SentimentConfig) -> Self {
        Self {
            config,
            backend: OnceCell::new(),
        }
    }

    /// Create a classifier around an already constructed backend.
    pub fn with_backend(backend: Arc<dyn SentimentBackend>, timeout: Duration) -> Self {
        Self {
            config: SentimentConfig {
                timeout,
                ..SentimentConfig::default()
            },
            backend: OnceCell::new_with(Some(Some(backend))),
        }
    }

    /// Create a classifier that always answers `unknown`.
    pub fn disabled() -> Self {
        Self {
            config: SentimentConfig {
                strategy: SentimentStrategy::Disabled,
                ..SentimentConfig::default()
            },
            backend: OnceCell::new_with(Some(None)),
        }
    }

    /// Whether the backend has been resolved yet.
    pub fn is_initialized(&self) -> bool {
        self.backend.initialized()
    }

    /// Resolve the backend, initializing it on first call.
    ///
    /// Concurrent first callers wait for the same initialization.
    async fn backend(&self) -> Option<&Arc<dyn SentimentBackend>> {
        self.backend
            .get_or_init(|| async { self.initialize() })
            .await
            .as_ref()
    }

    fn initialize(&self) -> Option<Arc<dyn SentimentBackend>> {
        let backend: Option<Arc<dyn SentimentBackend>> = match self.config.strategy {
            SentimentStrategy::Disabled => None,
            SentimentStrategy::Keyword => Some(Arc::new(KeywordClassifier::default())),
            SentimentStrategy::Statistical => match HttpClassifier::new(
                self.config.classifier_url.as_deref(),
                self.config.classifier_token.clone(),
                self.config.timeout,
            ) {
                Ok(classifier) => Some(Arc::new(classifier)),
                Err(e) if self.config.keyword_fallback => {
                    warn!(error = %e, "Statistical classifier unavailable, using keyword heuristic");
                    Some(Arc::new(KeywordClassifier::default()))
                }
                Err(e) => {
                    warn!(error = %e, "Statistical classifier unavailable, sentiment disabled");
                    None
                }
            },
        };

        match &backend {
            Some(b) => info!(backend = b.name(), "Sentiment classifier initialized"),
            None => info!("Sentiment classification disabled"),
        }
        backend
    }

    /// Classify a message. Never fails; problems yield `unknown`.
    pub async fn classify(&self, text: &str) -> SentimentLabel {
        if text.trim().is_empty() {
            return SentimentLabel::Unknown;
        }
        let Some(backend) = self.backend().await else {
            return SentimentLabel::Unknown;
        };

        let call = AssertUnwindSafe(backend.classify(text)).catch_unwind();
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(Ok(label))) => {
                debug!(backend = backend.name(), label = %label, "Message classified");
                label
            }
            Ok(Ok(Err(e))) => {
                warn!(backend = backend.name(), error = %e, "Sentiment classification failed");
                SentimentLabel::Unknown
            }
            Ok(Err(_)) => {
                warn!(backend = backend.name(), "Sentiment classifier panicked");
                SentimentLabel::Unknown
            }
            Err(_) => {
                warn!(
                    backend = backend.name(),
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Sentiment classification timed out"
                );
                SentimentLabel::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingBackend;

    #[async_trait]
    impl SentimentBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn classify(&self, _text: &str) -> Result<SentimentLabel, ClassifierError> {
            Err(ClassifierError::Response("model is loading".to_string()))
        }
    }

    struct PanickingBackend;

    #[async_trait]
    impl SentimentBackend for PanickingBackend {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn classify(&self, _text: &str) -> Result<SentimentLabel, ClassifierError> {
            panic!("classifier blew up");
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl SentimentBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn classify(&self, _text: &str) -> Result<SentimentLabel, ClassifierError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SentimentLabel::Positive)
        }
    }

    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SentimentBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn classify(&self, _text: &str) -> Result<SentimentLabel, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SentimentLabel::Neutral)
        }
    }

    #[test]
    fn test_keyword_labels() {
        let k = KeywordClassifier::default();
        assert_eq!(k.label("This is GREAT, thanks"), SentimentLabel::Positive);
        assert_eq!(k.label("my build is broken again"), SentimentLabel::Negative);
        assert_eq!(k.label("what is the capital of France?"), SentimentLabel::Neutral);
        assert_eq!(k.label(""), SentimentLabel::Neutral);
    }

    #[test]
    fn test_keyword_earliest_match_wins() {
        let k = KeywordClassifier::default();
        assert_eq!(k.label("I hate that this was good"), SentimentLabel::Negative);
        assert_eq!(k.label("good start, bad ending"), SentimentLabel::Positive);
    }

    #[tokio::test]
    async fn test_empty_text_is_unknown() {
        let classifier = SentimentClassifier::new(SentimentConfig::default());
        assert_eq!(classifier.classify("").await, SentimentLabel::Unknown);
        assert_eq!(classifier.classify("   ").await, SentimentLabel::Unknown);
    }

    #[tokio::test]
    async fn test_backend_failure_is_unknown() {
        let classifier =
            SentimentClassifier::with_backend(Arc::new(FailingBackend), Duration::from_secs(1));
        assert_eq!(classifier.classify("hello").await, SentimentLabel::Unknown);
    }

    #[tokio::test]
    async fn test_backend_panic_is_unknown() {
        let classifier =
            SentimentClassifier::with_backend(Arc::new(PanickingBackend), Duration::from_secs(1));
        assert_eq!(classifier.classify("hello").await, SentimentLabel::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_timeout_is_unknown() {
        let classifier =
            SentimentClassifier::with_backend(Arc::new(SlowBackend), Duration::from_millis(50));
        assert_eq!(classifier.classify("great").await, SentimentLabel::Unknown);
    }

    #[tokio::test]
    async fn test_statistical_without_url_falls_back_to_keywords() {
        let classifier = SentimentClassifier::new(SentimentConfig {
            strategy: SentimentStrategy::Statistical,
            ..SentimentConfig::default()
        });
        assert!(!classifier.is_initialized());
        assert_eq!(classifier.classify("I love it").await, SentimentLabel::Positive);
        assert!(classifier.is_initialized());
    }

    #[tokio::test]
    async fn test_statistical_without_fallback_is_unknown() {
        let classifier = SentimentClassifier::new(SentimentConfig {
            strategy: SentimentStrategy::Statistical,
            classifier_url: Some("not a url".to_string()),
            keyword_fallback: false,
            ..SentimentConfig::default()
        });
        assert_eq!(classifier.classify("I love it").await, SentimentLabel::Unknown);
    }

    #[tokio::test]
    async fn test_disabled_is_unknown() {
        let classifier = SentimentClassifier::disabled();
        assert_eq!(classifier.classify("I love it").await, SentimentLabel::Unknown);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_shares_backend() {
        let classifier = Arc::new(SentimentClassifier::new(SentimentConfig::default()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let classifier = classifier.clone();
                tokio::spawn(async move {
                    let text = if i % 2 == 0 { "awesome" } else { "awful" };
                    (i, classifier.classify(text).await)
                })
            })
            .collect();

        for task in tasks {
            let (i, label) = task.await.unwrap();
            let expected = if i % 2 == 0 {
                SentimentLabel::Positive
            } else {
                SentimentLabel::Negative
            };
            assert_eq!(label, expected);
        }
        assert!(classifier.is_initialized());
    }

    #[tokio::test]
    async fn test_injected_backend_is_used() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let classifier = SentimentClassifier::with_backend(backend.clone(), Duration::from_secs(1));

        assert_eq!(classifier.classify("a").await, SentimentLabel::Neutral);
        assert_eq!(classifier.classify("b").await, SentimentLabel::Neutral);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_inference_response_shapes() {
        let nested: InferenceResponse = serde_json::from_str(
            r#"[[{"label":"NEGATIVE","score":0.1},{"label":"POSITIVE","score":0.9}]]"#,
        )
        .unwrap();
        assert_eq!(best_label(nested), Some(SentimentLabel::Positive));

        let flat: InferenceResponse =
            serde_json::from_str(r#"[{"label":"LABEL_0","score":0.7},{"label":"LABEL_2","score":0.2}]"#)
                .unwrap();
        assert_eq!(best_label(flat), Some(SentimentLabel::Negative));

        assert!(serde_json::from_str::<InferenceResponse>(r#"{"error":"loading"}"#).is_err());
    }
}
