//! Session configuration: the immutable value threaded through every
//! engine call.
//!
//! [`SessionConfig`] is built once per session (from files, flags or code)
//! and then only read. Builder methods consume `self` and return a new
//! value, so a change always produces a fresh configuration for the next
//! session instead of rewriting shared state.

use relay_domain::{ApprovalMode, QuotaConfig, ToolInclusion};
use std::time::Duration;

/// How the turn manager interleaves tool calls with the model stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallPolicy {
    /// Block on each call before reading the next fragment
    Sequential,
    /// Keep up to `max_concurrent` calls outstanding while reading on
    Pipelined { max_concurrent: usize },
}

impl ToolCallPolicy {
    /// Outstanding calls allowed before the turn blocks on the oldest
    pub fn max_outstanding(&self) -> usize {
        match self {
            ToolCallPolicy::Sequential => 1,
            ToolCallPolicy::Pipelined { max_concurrent } => (*max_concurrent).max(1),
        }
    }
}

impl Default for ToolCallPolicy {
    fn default() -> Self {
        ToolCallPolicy::Pipelined { max_concurrent: 4 }
    }
}

/// Scheduler-level backoff for transient resource errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// How long one admission attempt waits for capacity
    pub wait_timeout: Duration,
    /// Additional admission attempts after the first timeout
    pub max_retries: u32,
    /// Added to the wait of the first retry; doubles on each further retry.
    /// A waiting call keeps its queue position across retries.
    pub backoff: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(60),
            max_retries: 2,
            backoff: Duration::from_millis(100),
        }
    }
}

impl AdmissionPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

/// Defaults for adaptive task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveDefaults {
    /// Maximum attempts per task
    pub bound: u32,
    /// Consecutive `Retry` verdicts before the escalation port is consulted
    pub escalate_after: Option<u32>,
}

impl Default for AdaptiveDefaults {
    fn default() -> Self {
        Self {
            bound: 3,
            escalate_after: None,
        }
    }
}

/// Immutable per-session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub approval_mode: ApprovalMode,
    pub quotas: QuotaConfig,
    /// Default execution timeout for tools without their own
    pub execution_timeout: Duration,
    /// How long a `RequireConfirmation` decision waits before denying
    pub confirmation_timeout: Duration,
    /// Maximum model invocations per turn
    pub max_turn_depth: usize,
    pub tool_call_policy: ToolCallPolicy,
    pub admission: AdmissionPolicy,
    pub adaptive: AdaptiveDefaults,
    /// Tools advertised to the model boundary
    pub tool_inclusion: ToolInclusion,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::Default,
            quotas: QuotaConfig::default(),
            execution_timeout: Duration::from_secs(300),
            confirmation_timeout: Duration::from_secs(30),
            max_turn_depth: 10,
            tool_call_policy: ToolCallPolicy::default(),
            admission: AdmissionPolicy::default(),
            adaptive: AdaptiveDefaults::default(),
            tool_inclusion: ToolInclusion::All,
        }
    }
}

impl SessionConfig {
    // ==================== Builder Methods ====================

    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_quotas(mut self, quotas: QuotaConfig) -> Self {
        self.quotas = quotas;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_max_turn_depth(mut self, depth: usize) -> Self {
        self.max_turn_depth = depth;
        self
    }

    pub fn with_tool_call_policy(mut self, policy: ToolCallPolicy) -> Self {
        self.tool_call_policy = policy;
        self
    }

    pub fn with_admission(mut self, admission: AdmissionPolicy) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_adaptive(mut self, adaptive: AdaptiveDefaults) -> Self {
        self.adaptive = adaptive;
        self
    }

    pub fn with_tool_inclusion(mut self, inclusion: ToolInclusion) -> Self {
        self.tool_inclusion = inclusion;
        self
    }
}
