//! The streaming relay.
//!
//! [`open_relay`] does everything that can fail synchronously (validation,
//! credentials, request building) and only then hands back an event stream.
//! [`relay_events`] turns provider fragments into stream events and always
//! ends with exactly one `Stop` or `Error`.

use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};
use gargi_core::{ChatRequest, SentimentLabel, StreamEvent};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::history::normalize_history;
use crate::persona::system_instruction;
use crate::provider::{FragmentStream, ProviderError};
use crate::state::AppState;

/// User-facing text for any credential problem.
pub const INVALID_API_KEY_MESSAGE: &str =
    "Invalid API Key. Please check the server configuration.";

/// Relayed events for one request.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Prepare a relay for one chat request.
///
/// Returns `Err` only for failures known before streaming starts; every later
/// failure becomes the stream's terminal `Error` event. Missing credentials
/// are checked before sentiment so a 503 never waits on the classifier.
pub async fn open_relay(
    state: &AppState,
    request: ChatRequest,
    request_id: Uuid,
) -> Result<EventStream, ApiError> {
    request.validate()?;

    if !state.provider.is_configured() {
        let err = ProviderError::MissingCredentials {
            provider: state.provider.name(),
        };
        warn!(request_id = %request_id, error = %err, "Provider unavailable");
        return Err(err.into());
    }

    let sentiment: SentimentLabel = state.sentiment.classify(&request.message).await;
    info!(request_id = %request_id, sentiment = %sentiment, "Sentiment resolved");

    let instruction = system_instruction(sentiment);
    let history = normalize_history(&request.history, state.provider.vocabulary());

    let fragments = state
        .provider
        .stream_reply(&history, &request.message, &instruction)
        .map_err(|e| {
            warn!(
                request_id = %request_id,
                provider = state.provider.name(),
                error = %e,
                "Provider unavailable"
            );
            ApiError::from(e)
        })?;

    info!(
        request_id = %request_id,
        provider = state.provider.name(),
        "Relay stream opened"
    );
    Ok(relay_events(fragments, request_id))
}

/// Map a provider failure to the text shown to the user.
pub fn sanitize_error(err: &ProviderError) -> String {
    if err.is_credential_related() {
        INVALID_API_KEY_MESSAGE.to_string()
    } else {
        err.to_string()
    }
}

enum RelayState {
    Streaming {
        fragments: FragmentStream,
        forwarded: usize,
    },
    Finished,
}

/// Wrap provider fragments as stream events.
///
/// Pull-based: the next fragment is requested only when the consumer asks
/// for the next event, so nothing is buffered ahead of the transport.
pub fn relay_events(fragments: FragmentStream, request_id: Uuid) -> EventStream {
    let initial = RelayState::Streaming {
        fragments,
        forwarded: 0,
    };

    let events = stream::unfold(initial, move |state| async move {
        let RelayState::Streaming {
            mut fragments,
            forwarded,
        } = state
        else {
            return None;
        };

        match fragments.next().await {
            Some(Ok(text)) => Some((
                StreamEvent::content(text),
                RelayState::Streaming {
                    fragments,
                    forwarded: forwarded + 1,
                },
            )),
            Some(Err(err)) => {
                warn!(
                    request_id = %request_id,
                    fragments = forwarded,
                    error = %err,
                    "Relay finished with error"
                );
                Some((
                    StreamEvent::error(sanitize_error(&err)),
                    RelayState::Finished,
                ))
            }
            None => {
                info!(request_id = %request_id, fragments = forwarded, "Relay finished");
                Some((StreamEvent::Stop, RelayState::Finished))
            }
        }
    });

    Box::pin(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(items: Vec<Result<&'static str, ProviderError>>) -> FragmentStream {
        Box::pin(stream::iter(
            items.into_iter().map(|item| item.map(str::to_string)),
        ))
    }

    async fn collect(items: Vec<Result<&'static str, ProviderError>>) -> Vec<StreamEvent> {
        relay_events(fragments(items), Uuid::new_v4()).collect().await
    }

    #[tokio::test]
    async fn test_success_ends_with_single_stop() {
        let events = collect(vec![Ok("Hel"), Ok("lo"), Ok(", world")]).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::content("Hel"),
                StreamEvent::content("lo"),
                StreamEvent::content(", world"),
                StreamEvent::Stop,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_reply_is_just_stop() {
        assert_eq!(collect(vec![]).await, vec![StreamEvent::Stop]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_error_only() {
        let events = collect(vec![
            Ok("partial"),
            Err(ProviderError::Upstream("connection reset".into())),
            Ok("never relayed"),
        ])
        .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::content("partial"),
                StreamEvent::error("connection reset"),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_call_failure_has_no_content() {
        let events = collect(vec![Err(ProviderError::Upstream("503 from upstream".into()))]).await;
        assert_eq!(events, vec![StreamEvent::error("503 from upstream")]);
    }

    #[tokio::test]
    async fn test_credential_failure_is_sanitized() {
        let events = collect(vec![Err(ProviderError::Authentication(
            "Incorrect API key provided: sk-abc***".into(),
        ))])
        .await;
        assert_eq!(events, vec![StreamEvent::error(INVALID_API_KEY_MESSAGE)]);
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let cases: Vec<Vec<Result<&'static str, ProviderError>>> = vec![
            vec![],
            vec![Ok("a")],
            vec![Ok("a"), Ok("b"), Ok("c")],
            vec![Err(ProviderError::Upstream("x".into()))],
            vec![
                Ok("a"),
                Err(ProviderError::Upstream("x".into())),
                Err(ProviderError::Upstream("y".into())),
            ],
        ];

        for case in cases {
            let events = collect(case).await;
            let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
            assert_eq!(terminal.len(), 1);
            assert!(events.last().unwrap().is_terminal());
        }
    }

    #[tokio::test]
    async fn test_forwards_before_pulling_next() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source: FragmentStream = Box::pin(stream::iter(0..3).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ProviderError>(i.to_string())
        }));

        let mut events = relay_events(source, Uuid::new_v4());
        assert_eq!(events.next().await, Some(StreamEvent::content("0")));
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
        assert_eq!(events.next().await, Some(StreamEvent::content("1")));
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }
}
