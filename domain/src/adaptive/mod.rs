//! Adaptive retry domain.
//!
//! A goal-directed task runs one tool repeatedly: attempt, judge, and on
//! `Retry` apply externally proposed arguments. [`RetryContext`] is the
//! bookkeeping for one such run and is the only place its counters change.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::error::DomainError;
use crate::execution::ToolCallOutcome;

/// An evaluator's judgment of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Retry(String),
    Fail(String),
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::Retry(_) => "retry",
            Verdict::Fail(_) => "fail",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Success => None,
            Verdict::Retry(r) | Verdict::Fail(r) => Some(r),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.as_str(), reason),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

/// (arguments, outcome, verdict) triple of one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    pub arguments: HashMap<String, Value>,
    pub outcome: ToolCallOutcome,
    pub verdict: Verdict,
}

/// Effect of applying a suggester's proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalEffect {
    /// Arguments differ from the previous attempt
    Changed,
    /// Same arguments again; one repetition is tolerated
    Repeated,
    /// Same arguments a second consecutive time
    NoProgress,
}

/// State of one adaptive task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryContext {
    pub tool_name: String,
    attempts: u32,
    bound: u32,
    current_arguments: HashMap<String, Value>,
    history: Vec<AttemptRecord>,
    identical_proposals: u32,
    consecutive_retries: u32,
}

impl RetryContext {
    pub fn new(
        tool_name: impl Into<String>,
        arguments: HashMap<String, Value>,
        bound: u32,
    ) -> Result<Self, DomainError> {
        if bound == 0 {
            return Err(DomainError::InvalidBound(bound));
        }
        Ok(Self {
            tool_name: tool_name.into(),
            attempts: 0,
            bound,
            current_arguments: arguments,
            history: Vec::new(),
            identical_proposals: 0,
            consecutive_retries: 0,
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn bound(&self) -> u32 {
        self.bound
    }

    pub fn current_arguments(&self) -> &HashMap<String, Value> {
        &self.current_arguments
    }

    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<AttemptRecord> {
        self.history
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.bound
    }

    /// Count a new attempt. Returns its 1-based number, or `None` once the
    /// bound is reached; the counter never exceeds the bound.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    /// Record the judged outcome of the current attempt.
    pub fn record(&mut self, outcome: ToolCallOutcome, verdict: Verdict) {
        if matches!(verdict, Verdict::Retry(_)) {
            self.consecutive_retries += 1;
        } else {
            self.consecutive_retries = 0;
        }
        self.history.push(AttemptRecord {
            attempt: self.attempts,
            arguments: self.current_arguments.clone(),
            outcome,
            verdict,
        });
    }

    /// Apply externally proposed arguments for the next attempt.
    pub fn apply_proposal(&mut self, arguments: HashMap<String, Value>) -> ProposalEffect {
        if arguments == self.current_arguments {
            self.identical_proposals += 1;
            if self.identical_proposals > 1 {
                return ProposalEffect::NoProgress;
            }
            return ProposalEffect::Repeated;
        }
        self.identical_proposals = 0;
        self.current_arguments = arguments;
        ProposalEffect::Changed
    }

    /// `Retry` verdicts since the last non-retry verdict or escalation reset
    pub fn consecutive_retries(&self) -> u32 {
        self.consecutive_retries
    }

    pub fn reset_retry_streak(&mut self) {
        self.consecutive_retries = 0;
    }

    pub fn last_outcome(&self) -> Option<&ToolCallOutcome> {
        self.history.last().map(|r| &r.outcome)
    }
}
