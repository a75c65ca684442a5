//! Domain layer for tool-relay
//!
//! This crate contains the pure types of the turn/tool-execution engine.
//! It has no dependencies on an async runtime, I/O, or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Tool calls
//!
//! A [`ToolCall`] is a single request to invoke a named capability with
//! structured arguments. Every call walks a lifecycle that is a DAG:
//!
//! ```text
//! Validating -> Scheduled -> AwaitingApproval -> Executing -> Completed | Failed
//!        \__________\______________\_________________\______> Cancelled
//! ```
//!
//! ## Approval
//!
//! An [`ApprovalMode`] is a session-scoped policy. [`ApprovalMode::decide`]
//! maps a tool definition to an [`ApprovalDecision`].
//!
//! ## Adaptive retries
//!
//! A [`RetryContext`] records the attempts of one goal-directed task and
//! enforces its bound.

pub mod adaptive;
pub mod approval;
pub mod config;
pub mod conversation;
pub mod core;
pub mod execution;
pub mod resource;
pub mod tool;

// Re-export commonly used types
pub use adaptive::{AttemptRecord, ProposalEffect, RetryContext, Verdict};
pub use approval::{ApprovalDecision, ApprovalMode};
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use conversation::{ConversationHistory, HistoryEntry, StreamFragment, ToolCallRequest};
pub use core::error::DomainError;
pub use execution::{
    CallFailure, CallFingerprint, FailureKind, StateTransition, ToolCallOutcome, ToolCallState,
    ToolExecution,
};
pub use resource::{QuotaConfig, ResourceKind, ResourceUsage};
pub use tool::{
    entities::{
        RiskLevel, ToolCall, ToolCategory, ToolDefinition, ToolInclusion, ToolParameter, ToolSpec,
    },
    traits::{DefaultToolValidator, ToolValidator},
    value_objects::ToolError,
};
