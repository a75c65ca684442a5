//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; conversion into the immutable
//! [`SessionConfig`] happens in [`FileConfig::to_session_config`].

mod approval;
mod engine;
mod logging;
mod tools;

pub use approval::FileApprovalConfig;
pub use engine::{FileAdaptiveConfig, FileExecutionConfig, FileQuotasConfig, FileTurnConfig};
pub use logging::FileLoggingConfig;
pub use tools::{FileCommandToolConfig, FileCommandToolParameter, FileToolsConfig};

use relay_application::SessionConfig;
use relay_domain::ConfigIssue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration that cannot be used at all
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("invalid configuration: {}", format_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub approval: FileApprovalConfig,
    pub quotas: FileQuotasConfig,
    pub execution: FileExecutionConfig,
    pub turn: FileTurnConfig,
    pub adaptive: FileAdaptiveConfig,
    pub logging: FileLoggingConfig,
    pub tools: FileToolsConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.approval.parse_mode().1);
        issues.extend(self.approval.parse_confirmation_timeout().1);
        issues.extend(self.quotas.to_quota_config().1);
        issues.extend(self.execution.parse_timeout().1);
        issues.extend(self.execution.to_admission_policy().1);
        issues.extend(self.turn.parse_max_depth().1);
        issues.extend(self.turn.parse_policy().1);
        issues.extend(self.turn.parse_inclusion().1);
        issues.extend(self.adaptive.to_defaults().1);
        issues.extend(self.tools.validate());

        issues
    }

    /// Fail on any `Error` issue; return the warnings otherwise.
    pub fn ensure_valid(&self) -> Result<Vec<ConfigIssue>, ConfigValidationError> {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            self.validate().into_iter().partition(ConfigIssue::is_error);
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ConfigValidationError::Invalid(errors))
        }
    }

    /// Build the session configuration. Invalid values fall back to
    /// defaults; call [`validate`](Self::validate) to see which.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_approval_mode(self.approval.parse_mode().0)
            .with_confirmation_timeout(self.approval.parse_confirmation_timeout().0)
            .with_quotas(self.quotas.to_quota_config().0)
            .with_execution_timeout(self.execution.parse_timeout().0)
            .with_admission(self.execution.to_admission_policy().0)
            .with_max_turn_depth(self.turn.parse_max_depth().0)
            .with_tool_call_policy(self.turn.parse_policy().0)
            .with_tool_inclusion(self.turn.parse_inclusion().0)
            .with_adaptive(self.adaptive.to_defaults().0)
    }
}
