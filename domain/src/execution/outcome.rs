//! Terminal results of tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::state::ToolCallState;
use crate::tool::value_objects::ToolError;

/// Why a call did not complete successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Arguments did not match the tool's input schema
    InvalidArguments,
    /// No tool with that name is registered
    ToolNotFound,
    /// Approval gate denied, or confirmation timed out
    ApprovalDenied,
    /// Tool exceeded its time budget
    ExecutionTimeout,
    /// Tool reported a domain-level failure
    ToolError,
    /// Quota full and admission retries exhausted
    QuotaExceeded,
    /// Waiting for capacity timed out on every admission retry
    ResourceTimeout,
    /// Identical (tool, arguments) already seen in this turn
    DuplicateCallSuppressed,
    /// Cancelled by the caller or the enclosing turn
    Cancelled,
    /// Tool task panicked
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidArguments => "invalid_arguments",
            FailureKind::ToolNotFound => "tool_not_found",
            FailureKind::ApprovalDenied => "approval_denied",
            FailureKind::ExecutionTimeout => "execution_timeout",
            FailureKind::ToolError => "tool_error",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::ResourceTimeout => "resource_timeout",
            FailureKind::DuplicateCallSuppressed => "duplicate_call_suppressed",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Panicked => "panicked",
        }
    }

    /// Structural failures are returned to the caller and never retried by
    /// the engine; the rest are routed through an evaluator.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FailureKind::InvalidArguments
                | FailureKind::ToolNotFound
                | FailureKind::ApprovalDenied
                | FailureKind::QuotaExceeded
                | FailureKind::ResourceTimeout
                | FailureKind::DuplicateCallSuppressed
                | FailureKind::Cancelled
        )
    }

    /// Eligible for scheduler-level backoff before surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::QuotaExceeded | FailureKind::ResourceTimeout
        )
    }

    /// Terminal state a call with this failure ends in.
    pub fn terminal_state(&self) -> ToolCallState {
        match self {
            FailureKind::ApprovalDenied
            | FailureKind::DuplicateCallSuppressed
            | FailureKind::Cancelled => ToolCallState::Cancelled,
            _ => ToolCallState::Failed,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure payload of a call that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Error as reported by the tool, for `ToolError` failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_error: Option<ToolError>,
    /// Call that already carried this (tool, arguments) pair in the turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

impl CallFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tool_error: None,
            duplicate_of: None,
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidArguments, message)
    }

    pub fn tool_not_found(tool_name: &str) -> Self {
        Self::new(
            FailureKind::ToolNotFound,
            format!("Tool not found: {}", tool_name),
        )
    }

    pub fn approval_denied(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::ApprovalDenied, reason)
    }

    pub fn execution_timeout(timeout_ms: u64) -> Self {
        Self::new(
            FailureKind::ExecutionTimeout,
            format!("Execution exceeded {}ms", timeout_ms),
        )
    }

    pub fn from_tool_error(error: ToolError) -> Self {
        Self {
            kind: FailureKind::ToolError,
            message: error.message.clone(),
            tool_error: Some(error),
            duplicate_of: None,
        }
    }

    pub fn duplicate_of(original_call_id: impl Into<String>) -> Self {
        let original = original_call_id.into();
        Self {
            kind: FailureKind::DuplicateCallSuppressed,
            message: format!("Identical call already issued as {}", original),
            tool_error: None,
            duplicate_of: Some(original),
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancelled, reason)
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Panicked, message)
    }

    /// Error code of the underlying tool error, if any
    pub fn tool_code(&self) -> Option<&str> {
        self.tool_error.as_ref().map(|e| e.code.as_str())
    }
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Final observable result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: HashMap<String, Value>,
    /// Always a terminal state
    pub state: ToolCallState,
    pub result: Result<Value, CallFailure>,
    pub duration_ms: u64,
}

impl ToolCallOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn payload(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&CallFailure> {
        self.result.as_ref().err()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure().map(|f| f.kind)
    }

    pub fn is_duplicate(&self) -> bool {
        self.failure_kind() == Some(FailureKind::DuplicateCallSuppressed)
    }
}
