//! Domain errors

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("call {call_id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        call_id: String,
        from: String,
        to: String,
    },

    #[error("unknown approval mode: {0}")]
    UnknownApprovalMode(String),

    #[error("attempt bound must be at least 1, got {0}")]
    InvalidBound(u32),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Returns `true` if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = DomainError::InvalidTransition {
            call_id: "call-1".to_string(),
            from: "completed".to_string(),
            to: "executing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "call call-1: illegal transition completed -> executing"
        );
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_is_cancelled() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::InvalidBound(0).is_cancelled());
    }
}
