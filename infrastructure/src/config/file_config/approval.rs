//! Approval configuration from TOML (`[approval]` section)

use relay_domain::{ApprovalMode, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw approval configuration from TOML
///
/// # Example
///
/// ```toml
/// [approval]
/// mode = "default"                 # "default", "plan-only", "auto-edit", "unrestricted"
/// confirmation_timeout_secs = 30
/// confirm = "prompt"               # "prompt", "approve", "deny"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileApprovalConfig {
    /// Session approval mode
    pub mode: String,
    /// Seconds a confirmation request waits before it is denied
    pub confirmation_timeout_secs: u64,
    /// How the CLI answers confirmation requests
    pub confirm: String,
}

impl Default for FileApprovalConfig {
    fn default() -> Self {
        Self {
            mode: "default".to_string(),
            confirmation_timeout_secs: 30,
            confirm: "prompt".to_string(),
        }
    }
}

impl FileApprovalConfig {
    /// Parse mode string into ApprovalMode, returning warnings on failure.
    pub fn parse_mode(&self) -> (ApprovalMode, Vec<ConfigIssue>) {
        match self.mode.parse::<ApprovalMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let valid: Vec<&str> = ApprovalMode::all().iter().map(|m| m.as_str()).collect();
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::UnknownApprovalMode,
                    format!(
                        "approval.mode: unknown value '{}' (expected one of {}), falling back to 'default'",
                        self.mode,
                        valid.join(", ")
                    ),
                );
                (ApprovalMode::default(), vec![issue])
            }
        }
    }

    pub fn parse_confirmation_timeout(&self) -> (Duration, Vec<ConfigIssue>) {
        if self.confirmation_timeout_secs == 0 {
            let issue = ConfigIssue::warning(
                ConfigIssueCode::ZeroTimeout,
                "approval.confirmation_timeout_secs cannot be 0, falling back to 30",
            );
            return (Duration::from_secs(30), vec![issue]);
        }
        (Duration::from_secs(self.confirmation_timeout_secs), vec![])
    }
}
