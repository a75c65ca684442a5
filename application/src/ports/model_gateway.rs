//! Model gateway port
//!
//! Defines how the turn manager obtains streamed output from a language
//! model. The gateway is expected to normalize tool-call requests into
//! (name, arguments) pairs before they reach the core.

use async_trait::async_trait;
use relay_domain::{ConversationHistory, StreamFragment, ToolDefinition};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur when starting a model turn
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("No scripted response left for turn segment {0}")]
    Exhausted(usize),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// Gateway for model communication
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Start one model segment for the given history.
    ///
    /// The returned stream is finite: it ends after `TurnComplete`,
    /// `StreamError`, or when the sender side is dropped.
    async fn start_turn(
        &self,
        history: &ConversationHistory,
        tools: &[ToolDefinition],
    ) -> Result<FragmentStream, GatewayError>;
}

/// Handle for receiving streamed fragments from one model segment.
pub struct FragmentStream {
    pub receiver: mpsc::Receiver<StreamFragment>,
}

impl FragmentStream {
    pub fn new(receiver: mpsc::Receiver<StreamFragment>) -> Self {
        Self { receiver }
    }

    /// Create a bounded channel whose receiving side is a stream.
    pub fn channel(capacity: usize) -> (mpsc::Sender<StreamFragment>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Build a stream that yields the given fragments and then ends.
    pub fn from_fragments(fragments: Vec<StreamFragment>) -> Self {
        let (tx, stream) = Self::channel(fragments.len());
        for fragment in fragments {
            // Capacity equals the fragment count, so this never fails
            let _ = tx.try_send(fragment);
        }
        stream
    }

    /// Next fragment, or `None` once the segment has ended.
    pub async fn next(&mut self) -> Option<StreamFragment> {
        self.receiver.recv().await
    }

    /// Consume the stream and collect all content text.
    ///
    /// Stops at the first terminal fragment; a `StreamError` is returned as
    /// `GatewayError::RequestFailed`.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            match fragment {
                StreamFragment::ContentDelta { text: chunk } => text.push_str(&chunk),
                StreamFragment::StreamError { message } => {
                    return Err(GatewayError::RequestFailed(message));
                }
                StreamFragment::TurnComplete => break,
                StreamFragment::ToolCallRequest(_) => {}
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_fragments_ends_after_last() {
        let mut stream = FragmentStream::from_fragments(vec![
            StreamFragment::content("a"),
            StreamFragment::TurnComplete,
        ]);
        assert_eq!(stream.next().await, Some(StreamFragment::content("a")));
        assert_eq!(stream.next().await, Some(StreamFragment::TurnComplete));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_collect_text() {
        let stream = FragmentStream::from_fragments(vec![
            StreamFragment::content("Hello, "),
            StreamFragment::content("world"),
            StreamFragment::TurnComplete,
            StreamFragment::content("ignored"),
        ]);
        assert_eq!(stream.collect_text().await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn test_collect_text_surfaces_stream_error() {
        let stream = FragmentStream::from_fragments(vec![
            StreamFragment::content("partial"),
            StreamFragment::error("reset by peer"),
        ]);
        let err = stream.collect_text().await.unwrap_err();
        assert!(matches!(err, GatewayError::RequestFailed(m) if m == "reset by peer"));
    }
}
