//! Shared helpers for the turn and adaptive-task use cases.

use crate::execution::TurnScope;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use relay_domain::ToolCallOutcome;
use relay_domain::core::string::truncate;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// True if the token exists and is cancelled.
pub(crate) fn is_cancelled(token: &Option<CancellationToken>) -> bool {
    token.as_ref().is_some_and(CancellationToken::is_cancelled)
}

/// Scope for one turn or attempt, linked to the caller's token if given.
pub(crate) fn scope_for(id: String, token: &Option<CancellationToken>) -> TurnScope {
    match token {
        Some(parent) => TurnScope::child_of(id, parent),
        None => TurnScope::new(id),
    }
}

/// Short single-line preview of a call's arguments for log messages.
pub(crate) fn args_preview(arguments: &impl serde::Serialize) -> String {
    let rendered = serde_json::to_string(arguments).unwrap_or_default();
    truncate(&rendered, 120)
}

/// Record a terminal call outcome in the transcript.
pub(crate) fn log_tool_result(logger: &dyn ConversationLogger, scope_id: &str, outcome: &ToolCallOutcome) {
    let failure = outcome.failure();
    logger.log(ConversationEvent::new(
        "tool_result",
        json!({
            "turn_id": scope_id,
            "call_id": outcome.call_id,
            "tool": outcome.tool_name,
            "state": outcome.state,
            "duration_ms": outcome.duration_ms,
            "success": outcome.is_success(),
            "failure_kind": failure.map(|f| f.kind),
            "message": failure.map(|f| f.message.as_str()),
        }),
    ));
}
