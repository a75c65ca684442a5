//! Tool domain value objects
//!
//! [`ToolError`] is what a tool (local or remote) reports when it fails.
//! The engine wraps it into a `CallFailure` of kind `ToolError`, and the
//! adaptive loop's evaluator decides whether the code is worth a retry.

use serde::{Deserialize, Serialize};

/// Error reported by a tool invocation.
///
/// | Code | Raised by |
/// |------|-----------|
/// | `INVALID_ARGUMENT` | Tool rejected its arguments at runtime |
/// | `NOT_FOUND` | Tool or resource unknown to the tool source |
/// | `EXECUTION_FAILED` | Runtime failure (process, I/O, remote) |
/// | `PERMISSION_DENIED` | Access denied by the tool |
/// | `TIMEOUT` | The tool's own deadline elapsed |
/// | `CANCELLED` | The tool observed its cancellation signal |
/// | `UNAVAILABLE` | Transport or source not reachable |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error code (e.g., "NOT_FOUND", "EXECUTION_FAILED")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            "NOT_FOUND",
            format!("Resource not found: {}", resource.into()),
        )
    }

    pub fn permission_denied(resource: impl Into<String>) -> Self {
        Self::new(
            "PERMISSION_DENIED",
            format!("Permission denied: {}", resource.into()),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            "TIMEOUT",
            format!("Operation timed out: {}", operation.into()),
        )
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::new(
            "CANCELLED",
            format!("Operation cancelled: {}", operation.into()),
        )
    }

    pub fn unavailable(source: impl Into<String>) -> Self {
        Self::new(
            "UNAVAILABLE",
            format!("Tool source unavailable: {}", source.into()),
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == "CANCELLED"
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_codes() {
        assert_eq!(ToolError::not_found("x").code, "NOT_FOUND");
        assert_eq!(ToolError::invalid_argument("x").code, "INVALID_ARGUMENT");
        assert_eq!(ToolError::execution_failed("x").code, "EXECUTION_FAILED");
        assert_eq!(ToolError::timeout("x").code, "TIMEOUT");
        assert_eq!(ToolError::permission_denied("x").code, "PERMISSION_DENIED");
        assert_eq!(ToolError::unavailable("x").code, "UNAVAILABLE");
        assert!(ToolError::cancelled("sleep").is_cancelled());
    }

    #[test]
    fn test_display_with_details() {
        let err = ToolError::execution_failed("exit status 2").with_details("stderr: nope");
        assert_eq!(err.to_string(), "[EXECUTION_FAILED] exit status 2 (stderr: nope)");
    }
}
