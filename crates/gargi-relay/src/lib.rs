//! Gargi relay: a streaming chat proxy in front of a generative-AI provider.
//!
//! Each `POST /chat` request is classified for sentiment, wrapped in the
//! Gargi persona and forwarded to the configured provider. The reply is
//! streamed back to the caller as server-sent events.

pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod persona;
pub mod provider;
pub mod relay;
pub mod sentiment;
pub mod state;

pub use config::{Config, ProviderConfig, SentimentConfig};
pub use error::ApiError;
pub use http::create_router;
pub use provider::{FragmentStream, ProviderAdapter, ProviderError, ProviderKind};
pub use sentiment::{SentimentBackend, SentimentClassifier, SentimentStrategy};
pub use state::AppState;
