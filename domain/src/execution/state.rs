//! Tool call lifecycle state machine.
//!
//! # State Transitions
//!
//! ```text
//! Validating ──> Scheduled ──> AwaitingApproval ──> Executing ──> Completed
//!     │              │                │                  └──────> Failed
//!     ├──> Failed    ├──> Failed      │
//!     └──────────────┴────────────────┴──────────────────────────> Cancelled
//! ```
//!
//! The graph is a DAG: every edge moves strictly forward in [`ToolCallState::rank`],
//! and terminal states have no outgoing edges.

use serde::{Deserialize, Serialize};

use crate::core::error::DomainError;
use crate::tool::entities::ToolCall;

/// Current lifecycle state of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallState {
    Validating,
    Scheduled,
    AwaitingApproval,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl ToolCallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallState::Validating => "validating",
            ToolCallState::Scheduled => "scheduled",
            ToolCallState::AwaitingApproval => "awaiting_approval",
            ToolCallState::Executing => "executing",
            ToolCallState::Completed => "completed",
            ToolCallState::Failed => "failed",
            ToolCallState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolCallState::Completed | ToolCallState::Failed | ToolCallState::Cancelled
        )
    }

    /// Position along the lifecycle; legal transitions strictly increase it.
    pub fn rank(&self) -> u8 {
        match self {
            ToolCallState::Validating => 0,
            ToolCallState::Scheduled => 1,
            ToolCallState::AwaitingApproval => 2,
            ToolCallState::Executing => 3,
            ToolCallState::Completed | ToolCallState::Failed | ToolCallState::Cancelled => 4,
        }
    }

    pub fn can_transition_to(&self, next: ToolCallState) -> bool {
        use ToolCallState::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Cancelled) => true,
            (Validating, Scheduled | Failed) => true,
            (Scheduled, AwaitingApproval | Failed) => true,
            (AwaitingApproval, Executing) => true,
            (Executing, Completed | Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ToolCallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state entered by a call, with the wall-clock time it was entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: ToolCallState,
    /// Unix epoch millis
    pub at_ms: u64,
}

/// Lifecycle record of one tool call.
///
/// Holds exactly one live state; every state entered is appended to
/// `transitions`, so the full path stays observable after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub call: ToolCall,
    state: ToolCallState,
    transitions: Vec<StateTransition>,
}

impl ToolExecution {
    pub fn new(call: ToolCall) -> Self {
        Self {
            call,
            state: ToolCallState::Validating,
            transitions: vec![StateTransition {
                state: ToolCallState::Validating,
                at_ms: current_timestamp(),
            }],
        }
    }

    pub fn state(&self) -> ToolCallState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`, rejecting edges outside the lifecycle graph.
    pub fn transition(&mut self, next: ToolCallState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                call_id: self.call.id.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.transitions.push(StateTransition {
            state: next,
            at_ms: current_timestamp(),
        });
        Ok(())
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Sequence of states entered, oldest first
    pub fn path(&self) -> Vec<ToolCallState> {
        self.transitions.iter().map(|t| t.state).collect()
    }

    /// Whether the call ever reached `Executing`
    pub fn was_executed(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| t.state == ToolCallState::Executing)
    }
}

/// Check that a sequence of observed states is a walk through the lifecycle
/// graph starting at `Validating`.
pub fn is_valid_path(path: &[ToolCallState]) -> bool {
    match path.first() {
        Some(ToolCallState::Validating) => path.windows(2).all(|w| w[0].can_transition_to(w[1])),
        _ => false,
    }
}

fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ToolCallState::*;

    const ALL: [ToolCallState; 7] = [
        Validating,
        Scheduled,
        AwaitingApproval,
        Executing,
        Completed,
        Failed,
        Cancelled,
    ];

    fn execution() -> ToolExecution {
        ToolExecution::new(ToolCall::new("call-1", "dns_lookup"))
    }

    #[test]
    fn test_happy_path() {
        let mut exec = execution();
        for next in [Scheduled, AwaitingApproval, Executing, Completed] {
            exec.transition(next).unwrap();
        }
        assert_eq!(
            exec.path(),
            vec![Validating, Scheduled, AwaitingApproval, Executing, Completed]
        );
        assert!(exec.is_terminal());
        assert!(exec.was_executed());
        assert!(is_valid_path(&exec.path()));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        for terminal in [Completed, Failed, Cancelled] {
            for next in ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_cancelled_reachable_from_every_non_terminal() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(Cancelled), "{from}");
        }
    }

    #[test]
    fn test_transitions_strictly_increase_rank() {
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) {
                    assert!(to.rank() > from.rank(), "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut exec = execution();
        let err = exec.transition(Executing).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(exec.state(), Validating);
        assert_eq!(exec.transitions().len(), 1);

        exec.transition(Failed).unwrap();
        assert!(exec.transition(Cancelled).is_err());
        assert_eq!(exec.path(), vec![Validating, Failed]);
        assert!(!exec.was_executed());
    }

    #[test]
    fn test_is_valid_path() {
        assert!(is_valid_path(&[Validating, Cancelled]));
        assert!(is_valid_path(&[Validating, Scheduled, Failed]));
        assert!(!is_valid_path(&[Scheduled, Executing]));
        assert!(!is_valid_path(&[Validating, Executing]));
        assert!(!is_valid_path(&[Validating, Scheduled, Scheduled]));
        assert!(!is_valid_path(&[]));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&AwaitingApproval).unwrap();
        assert_eq!(json, "\"awaiting_approval\"");
    }
}
