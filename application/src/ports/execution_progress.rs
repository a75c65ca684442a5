//! Execution progress port.
//!
//! [`ExecutionProgressNotifier`] is an output port a front end implements to
//! display real-time progress. All methods have default no-op
//! implementations, so implementers only override the callbacks they need.

use relay_domain::{ToolCallOutcome, ToolCallState, Verdict};

pub trait ExecutionProgressNotifier: Send + Sync {
    // ==================== Model Callbacks ====================

    /// Called before each model invocation within a turn
    fn on_model_invocation(&self, _turn_id: &str, _depth: usize) {}

    /// Called for each content delta streamed by the model
    fn on_content_delta(&self, _text: &str) {}

    // ==================== Tool Call Callbacks ====================

    /// Called on every lifecycle transition of a call
    fn on_state_change(&self, _call_id: &str, _tool_name: &str, _state: ToolCallState) {}

    /// Called when a call reaches a terminal state
    fn on_tool_result(&self, _outcome: &ToolCallOutcome) {}

    /// Called when a call is parked waiting for confirmation
    fn on_confirmation_pending(&self, _call_id: &str, _tool_name: &str) {}

    // ==================== Adaptive Loop Callbacks ====================

    /// Called when an adaptive attempt starts
    fn on_attempt(&self, _tool_name: &str, _attempt: u32, _bound: u32) {}

    /// Called after the evaluator judged an attempt
    fn on_verdict(&self, _attempt: u32, _verdict: &Verdict) {}
}

/// No-op implementation for tests and headless runs.
pub struct NoExecutionProgress;

impl ExecutionProgressNotifier for NoExecutionProgress {}
