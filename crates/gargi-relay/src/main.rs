//! Gargi relay server.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gargi_relay::config::{resolve_api_key, DEFAULT_STATUS_TEXT};
use gargi_relay::{
    create_router, AppState, Config, ProviderConfig, ProviderKind, SentimentConfig,
    SentimentStrategy,
};

/// Streaming chat relay for the Gargi assistant.
#[derive(Parser, Debug)]
#[command(name = "gargi-relay", about = "Streaming chat relay for the Gargi assistant")]
struct Args {
    /// Interface to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Upstream AI provider
    #[arg(long, env = "GARGI_PROVIDER", value_enum, default_value_t = ProviderKind::Gemini)]
    provider: ProviderKind,

    /// Provider API key (falls back to the provider's own environment variable)
    #[arg(long, env = "GARGI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Provider project id
    #[arg(long, env = "GARGI_PROJECT_ID")]
    project_id: Option<String>,

    /// Model override
    #[arg(long, env = "GARGI_MODEL")]
    model: Option<String>,

    /// Provider base URL override
    #[arg(long, env = "GARGI_PROVIDER_BASE_URL")]
    provider_base_url: Option<String>,

    /// Sentiment classifier strategy
    #[arg(long, env = "GARGI_SENTIMENT", value_enum, default_value_t = SentimentStrategy::Keyword)]
    sentiment: SentimentStrategy,

    /// Endpoint of the statistical sentiment classifier
    #[arg(long, env = "GARGI_CLASSIFIER_URL")]
    classifier_url: Option<String>,

    /// Bearer token for the statistical sentiment classifier
    #[arg(long, env = "GARGI_CLASSIFIER_TOKEN", hide_env_values = true)]
    classifier_token: Option<String>,

    /// Do not fall back to keyword sentiment when the classifier cannot start
    #[arg(long)]
    no_keyword_fallback: bool,

    /// Timeout for one sentiment classification, in milliseconds
    #[arg(long, env = "GARGI_CLASSIFIER_TIMEOUT_MS", default_value_t = 5000)]
    classifier_timeout_ms: u64,

    /// Text reported by the liveness endpoint
    #[arg(long, env = "GARGI_STATUS_TEXT", default_value = DEFAULT_STATUS_TEXT)]
    status_text: String,
}

impl Args {
    fn into_config(self) -> Config {
        let api_key = resolve_api_key(self.provider, self.api_key);
        Config {
            bind_addr: format!("{}:{}", self.host, self.port),
            status_text: self.status_text,
            provider: ProviderConfig {
                kind: self.provider,
                api_key,
                project_id: self.project_id,
                model: self.model,
                base_url: self.provider_base_url,
            },
            sentiment: SentimentConfig {
                strategy: self.sentiment,
                classifier_url: self.classifier_url,
                classifier_token: self.classifier_token,
                keyword_fallback: !self.no_keyword_fallback,
                timeout: Duration::from_millis(self.classifier_timeout_ms),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gargi_relay=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if config.provider.api_key.is_none() {
        warn!(
            provider = %config.provider.kind,
            "No API key configured - chat requests will fail with 503"
        );
    }

    let state = AppState::from_config(&config)?;
    let router = create_router(state);

    info!(
        addr = %config.bind_addr,
        provider = %config.provider.kind,
        model = %config.provider.model(),
        sentiment = ?config.sentiment.strategy,
        "Starting Gargi relay"
    );

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gargi relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
