//! Run Turn use case (the Turn Manager).
//!
//! Drives one conversational turn as an explicit loop:
//!
//! 1. Invoke the model gateway with the current history (depth + 1)
//! 2. Consume the fragment stream:
//!    - `ContentDelta` is buffered and flushed as one `ModelContent` entry
//!    - `ToolCallRequest` is recorded and submitted to the scheduler; once
//!      the policy's outstanding-call bound is reached, the oldest call is
//!      awaited and its result folded into history
//!    - `TurnComplete` ends the turn after the segment's calls are folded
//!    - `StreamError` cancels every outstanding call and fails the turn
//! 3. If the segment issued calls and the model did not signal completion,
//!    loop back to 1 with the extended history
//!
//! Tool results are always appended in emission order, never completion
//! order. The depth counter bounds model invocations per turn.

use crate::config::{SessionConfig, ToolCallPolicy};
use crate::execution::{CallHandle, ToolExecutionScheduler, TurnScope};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::execution_progress::ExecutionProgressNotifier;
use crate::ports::model_gateway::{GatewayError, ModelGateway};
use crate::use_cases::shared::{args_preview, is_cancelled, log_tool_result, scope_for};
use relay_domain::{
    ConversationHistory, HistoryEntry, StreamFragment, ToolCall, ToolCallOutcome,
    ToolCallRequest, ToolInclusion,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Turn-level failures surfaced to the caller.
#[derive(Error, Debug)]
pub enum RunTurnError {
    #[error("Maximum turn depth of {max} model invocations exceeded")]
    MaxTurnDepthExceeded { max: usize },

    #[error("Model stream error: {0}")]
    StreamError(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Turn cancelled")]
    Cancelled,
}

impl RunTurnError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunTurnError::Cancelled)
    }
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub turn_id: String,
    /// Text of the final model segment
    pub final_text: String,
    /// Every call outcome of the turn, in emission order
    pub outcomes: Vec<ToolCallOutcome>,
    /// Model invocations used
    pub depth: usize,
}

/// How one model segment ended
enum SegmentEnd {
    /// `TurnComplete` received
    Complete,
    /// Stream closed without `TurnComplete`
    Exhausted,
    Error(String),
    Cancelled,
}

/// Per-segment state: buffered content and calls not yet folded.
struct Segment {
    content: String,
    pending: VecDeque<CallHandle>,
    calls: usize,
}

impl Segment {
    fn new() -> Self {
        Self {
            content: String::new(),
            pending: VecDeque::new(),
            calls: 0,
        }
    }

    /// Append buffered model text, if any, as one history entry.
    fn flush_content(&mut self, history: &mut ConversationHistory) -> Option<String> {
        if self.content.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.content);
        history.append(HistoryEntry::ModelContent { text: text.clone() });
        Some(text)
    }
}

/// Use case for running one turn against the model gateway.
pub struct RunTurnUseCase {
    gateway: Arc<dyn ModelGateway>,
    scheduler: ToolExecutionScheduler,
    max_turn_depth: usize,
    policy: ToolCallPolicy,
    inclusion: ToolInclusion,
    conversation_logger: Arc<dyn ConversationLogger>,
    turns: AtomicU64,
}

impl RunTurnUseCase {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        scheduler: ToolExecutionScheduler,
        config: &SessionConfig,
    ) -> Self {
        Self {
            gateway,
            scheduler,
            max_turn_depth: config.max_turn_depth,
            policy: config.tool_call_policy,
            inclusion: config.tool_inclusion.clone(),
            conversation_logger: Arc::new(NoConversationLogger),
            turns: AtomicU64::new(0),
        }
    }

    /// Create with a conversation logger.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn scheduler(&self) -> &ToolExecutionScheduler {
        &self.scheduler
    }

    fn progress(&self) -> &dyn ExecutionProgressNotifier {
        self.scheduler.progress().as_ref()
    }

    /// Run one turn, extending `history` in place.
    ///
    /// Entries appended before a failure stay in the history.
    pub async fn execute(
        &self,
        history: &mut ConversationHistory,
        cancellation: Option<CancellationToken>,
    ) -> Result<TurnOutput, RunTurnError> {
        if is_cancelled(&cancellation) {
            return Err(RunTurnError::Cancelled);
        }

        let turn_id = format!("turn-{}", self.turns.fetch_add(1, Ordering::SeqCst) + 1);
        let scope = scope_for(turn_id.clone(), &cancellation);
        let tools = self.scheduler.registry().definitions(&self.inclusion);
        let mut outcomes = Vec::new();
        let mut depth = 0;

        info!(turn_id = %turn_id, tools = tools.len(), policy = ?self.policy, "Starting turn");

        let result = loop {
            if scope.is_cancelled() {
                break Err(RunTurnError::Cancelled);
            }
            if depth >= self.max_turn_depth {
                warn!(turn_id = %turn_id, max = self.max_turn_depth, "Turn depth exhausted");
                break Err(RunTurnError::MaxTurnDepthExceeded {
                    max: self.max_turn_depth,
                });
            }
            depth += 1;

            self.progress().on_model_invocation(&turn_id, depth);
            self.conversation_logger.log(ConversationEvent::new(
                "model_invocation",
                json!({
                    "turn_id": turn_id,
                    "depth": depth,
                    "history_len": history.len(),
                    "tools": tools.len(),
                }),
            ));
            debug!(turn_id = %turn_id, depth, history_len = history.len(), "Invoking model");

            let started = tokio::select! {
                biased;
                _ = scope.token().cancelled() => Err(None),
                started = self.gateway.start_turn(history, &tools) => started.map_err(Some),
            };
            let mut stream = match started {
                Ok(stream) => stream,
                Err(None) => break Err(RunTurnError::Cancelled),
                Err(Some(e)) => break Err(RunTurnError::Gateway(e)),
            };

            let mut segment = Segment::new();
            let end = loop {
                let fragment = tokio::select! {
                    biased;
                    _ = scope.token().cancelled() => break SegmentEnd::Cancelled,
                    fragment = stream.next() => fragment,
                };
                match fragment {
                    None => break SegmentEnd::Exhausted,
                    Some(StreamFragment::ContentDelta { text }) => {
                        self.progress().on_content_delta(&text);
                        segment.content.push_str(&text);
                    }
                    Some(StreamFragment::ToolCallRequest(request)) => {
                        segment.flush_content(history);
                        let handle = self.submit(request, &scope, history);
                        segment.pending.push_back(handle);
                        segment.calls += 1;
                        while segment.pending.len() >= self.policy.max_outstanding() {
                            if let Some(oldest) = segment.pending.pop_front() {
                                self.fold(oldest, &scope, history, &mut outcomes).await;
                            }
                        }
                    }
                    Some(StreamFragment::TurnComplete) => break SegmentEnd::Complete,
                    Some(StreamFragment::StreamError { message }) => break SegmentEnd::Error(message),
                }
            };

            if matches!(end, SegmentEnd::Error(_) | SegmentEnd::Cancelled) {
                scope.cancel();
            }
            let text = segment.flush_content(history);
            while let Some(handle) = segment.pending.pop_front() {
                self.fold(handle, &scope, history, &mut outcomes).await;
            }

            match end {
                SegmentEnd::Error(message) => {
                    warn!(turn_id = %turn_id, depth, %message, "Model stream failed");
                    break Err(RunTurnError::StreamError(message));
                }
                SegmentEnd::Cancelled => break Err(RunTurnError::Cancelled),
                _ if scope.is_cancelled() => break Err(RunTurnError::Cancelled),
                SegmentEnd::Complete => break Ok(text.unwrap_or_default()),
                SegmentEnd::Exhausted if segment.calls == 0 => break Ok(text.unwrap_or_default()),
                SegmentEnd::Exhausted => {
                    debug!(turn_id = %turn_id, depth, calls = segment.calls, "Re-invoking model with tool results");
                }
            }
        };

        let status = match &result {
            Ok(_) => "completed",
            Err(RunTurnError::MaxTurnDepthExceeded { .. }) => "max_depth_exceeded",
            Err(RunTurnError::StreamError(_)) => "stream_error",
            Err(RunTurnError::Gateway(_)) => "gateway_error",
            Err(RunTurnError::Cancelled) => "cancelled",
        };
        self.conversation_logger.log(ConversationEvent::new(
            "turn_complete",
            json!({
                "turn_id": turn_id,
                "depth": depth,
                "calls": outcomes.len(),
                "status": status,
            }),
        ));
        info!(turn_id = %turn_id, depth, calls = outcomes.len(), status, "Turn finished");

        let final_text = result?;
        Ok(TurnOutput {
            turn_id,
            final_text,
            outcomes,
            depth,
        })
    }

    /// Record the request in history and hand it to the scheduler.
    fn submit(
        &self,
        request: ToolCallRequest,
        scope: &TurnScope,
        history: &mut ConversationHistory,
    ) -> CallHandle {
        let call_id = scope.assign_call_id(request.id);
        let call = ToolCall::new(call_id, request.name)
            .with_arguments(request.arguments)
            .in_turn(scope.turn_id());

        history.append(HistoryEntry::ToolCallRecord {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
        });
        self.conversation_logger.log(ConversationEvent::new(
            "tool_call",
            json!({
                "turn_id": scope.turn_id(),
                "call_id": call.id,
                "tool": call.tool_name,
                "arguments": call.arguments,
            }),
        ));
        debug!(call_id = %call.id, tool = %call.tool_name, args = %args_preview(&call.arguments), "Tool call requested");

        self.scheduler.submit(call, scope)
    }

    /// Await one call and append its result.
    async fn fold(
        &self,
        handle: CallHandle,
        scope: &TurnScope,
        history: &mut ConversationHistory,
        outcomes: &mut Vec<ToolCallOutcome>,
    ) {
        let outcome = handle.outcome().await;
        history.append(HistoryEntry::tool_result(&outcome));
        log_tool_result(self.conversation_logger.as_ref(), scope.turn_id(), &outcome);
        outcomes.push(outcome);
    }
}
