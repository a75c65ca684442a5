//! Scripted model gateway.
//!
//! Replays pre-recorded fragment segments, one segment per `start_turn`.
//! A script file is JSON:
//!
//! ```json
//! {
//!   "segments": [
//!     [
//!       { "type": "content_delta", "text": "Checking DNS" },
//!       { "type": "tool_call_request", "name": "dns_lookup", "arguments": { "domain": "example.org" } }
//!     ],
//!     [
//!       { "type": "content_delta", "text": "It resolves." },
//!       { "type": "turn_complete" }
//!     ]
//!   ]
//! }
//! ```

use async_trait::async_trait;
use relay_application::{FragmentStream, GatewayError, ModelGateway};
use relay_domain::{ConversationHistory, StreamFragment, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// On-disk form of a script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelScript {
    pub segments: Vec<Vec<StreamFragment>>,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid script {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Gateway that replays a [`ModelScript`]
pub struct ScriptedModelGateway {
    segments: Mutex<VecDeque<Vec<StreamFragment>>>,
    invocations: AtomicUsize,
    fragment_delay: Option<Duration>,
}

impl ScriptedModelGateway {
    pub fn new(script: ModelScript) -> Self {
        Self {
            segments: Mutex::new(script.segments.into()),
            invocations: AtomicUsize::new(0),
            fragment_delay: None,
        }
    }

    pub fn from_segments(segments: Vec<Vec<StreamFragment>>) -> Self {
        Self::new(ModelScript { segments })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: display.clone(),
            source,
        })?;
        let script: ModelScript = serde_json::from_str(&raw).map_err(|source| ScriptError::Parse {
            path: display,
            source,
        })?;
        Ok(Self::new(script))
    }

    /// Emit fragments one by one with this pause, like a live stream.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.segments.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelGateway for ScriptedModelGateway {
    async fn start_turn(
        &self,
        history: &ConversationHistory,
        tools: &[ToolDefinition],
    ) -> Result<FragmentStream, GatewayError> {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        let segment = self
            .segments
            .lock()
            .map_err(|_| GatewayError::Other("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or(GatewayError::Exhausted(invocation))?;
        debug!(
            invocation,
            fragments = segment.len(),
            history_len = history.len(),
            tools = tools.len(),
            "Replaying scripted segment"
        );

        let Some(delay) = self.fragment_delay else {
            return Ok(FragmentStream::from_fragments(segment));
        };

        let (tx, stream) = FragmentStream::channel(1);
        tokio::spawn(async move {
            for fragment in segment {
                tokio::time::sleep(delay).await;
                if tx.send(fragment).await.is_err() {
                    // Receiver gone: the turn stopped reading
                    break;
                }
            }
        });
        Ok(stream)
    }
}
