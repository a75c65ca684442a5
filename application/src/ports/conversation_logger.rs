//! Port for structured transcript logging.
//!
//! Separate from `tracing`: tracing carries human-readable diagnostics,
//! while this port records model invocations, tool calls, results and
//! adaptive verdicts as machine-readable events (JSONL in practice).

use serde_json::Value;

/// A structured transcript event.
///
/// The adapter stamps each event with a UTC timestamp when it is written.
pub struct ConversationEvent {
    /// Event type identifier (e.g., "tool_call", "adaptive_verdict").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging transcript events.
///
/// `log` is synchronous and non-fallible; write failures are the adapter's
/// concern and never interrupt execution.
pub trait ConversationLogger: Send + Sync {
    fn log(&self, event: ConversationEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
