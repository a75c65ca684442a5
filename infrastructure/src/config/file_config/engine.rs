//! Engine configuration from TOML
//! (`[quotas]`, `[execution]`, `[turn]` and `[adaptive]` sections)
//!
//! ```toml
//! [quotas]
//! max_concurrent_executions = 10
//! max_memory_bytes = 536870912
//!
//! [execution]
//! timeout_secs = 300
//! admission_wait_secs = 60
//! admission_retries = 2
//! admission_backoff_ms = 100
//!
//! [turn]
//! max_depth = 10
//! tool_call_policy = "pipelined"   # "sequential" or "pipelined"
//! max_concurrent_calls = 4
//! tools = "all"                    # "all", "none", "read-only"
//! include = []                     # explicit tool names (overrides `tools`)
//!
//! [adaptive]
//! bound = 3
//! escalate_after = 2
//! ```

use relay_application::{AdaptiveDefaults, AdmissionPolicy, ToolCallPolicy};
use relay_domain::{ConfigIssue, ConfigIssueCode, QuotaConfig, ToolInclusion};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw quota configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQuotasConfig {
    pub max_concurrent_executions: u64,
    pub max_memory_bytes: u64,
}

impl Default for FileQuotasConfig {
    fn default() -> Self {
        let defaults = QuotaConfig::default();
        Self {
            max_concurrent_executions: defaults.max_concurrent_executions.unwrap_or(10),
            max_memory_bytes: defaults.max_memory_bytes.unwrap_or(512 * 1024 * 1024),
        }
    }
}

impl FileQuotasConfig {
    /// Zero quotas are errors: no call could ever be admitted.
    pub fn to_quota_config(&self) -> (QuotaConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        if self.max_concurrent_executions == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroQuota,
                "quotas.max_concurrent_executions cannot be 0",
            ));
        }
        if self.max_memory_bytes == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroQuota,
                "quotas.max_memory_bytes cannot be 0",
            ));
        }
        let quotas = QuotaConfig::default()
            .with_max_concurrent(self.max_concurrent_executions.max(1))
            .with_max_memory_bytes(self.max_memory_bytes.max(1));
        (quotas, issues)
    }
}

/// Raw execution configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    /// Default tool execution timeout
    pub timeout_secs: u64,
    /// How long one admission attempt waits for capacity
    pub admission_wait_secs: u64,
    pub admission_retries: u32,
    pub admission_backoff_ms: u64,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        let admission = AdmissionPolicy::default();
        Self {
            timeout_secs: 300,
            admission_wait_secs: admission.wait_timeout.as_secs(),
            admission_retries: admission.max_retries,
            admission_backoff_ms: admission.backoff.as_millis() as u64,
        }
    }
}

impl FileExecutionConfig {
    pub fn parse_timeout(&self) -> (Duration, Vec<ConfigIssue>) {
        if self.timeout_secs == 0 {
            let issue = ConfigIssue::warning(
                ConfigIssueCode::ZeroTimeout,
                "execution.timeout_secs cannot be 0, falling back to 300",
            );
            return (Duration::from_secs(300), vec![issue]);
        }
        (Duration::from_secs(self.timeout_secs), vec![])
    }

    pub fn to_admission_policy(&self) -> (AdmissionPolicy, Vec<ConfigIssue>) {
        let defaults = AdmissionPolicy::default();
        let mut issues = Vec::new();
        let wait_timeout = if self.admission_wait_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroTimeout,
                format!(
                    "execution.admission_wait_secs cannot be 0, falling back to {}",
                    defaults.wait_timeout.as_secs()
                ),
            ));
            defaults.wait_timeout
        } else {
            Duration::from_secs(self.admission_wait_secs)
        };
        let policy = AdmissionPolicy {
            wait_timeout,
            max_retries: self.admission_retries,
            backoff: Duration::from_millis(self.admission_backoff_ms),
        };
        (policy, issues)
    }
}

/// Raw turn configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTurnConfig {
    /// Maximum model invocations per turn
    pub max_depth: usize,
    /// "sequential" or "pipelined"
    pub tool_call_policy: String,
    /// Outstanding calls allowed under the pipelined policy
    pub max_concurrent_calls: usize,
    /// Tools advertised to the model: "all", "none", "read-only"
    pub tools: String,
    /// Explicit tool names; overrides `tools` when non-empty
    pub include: Vec<String>,
}

impl Default for FileTurnConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            tool_call_policy: "pipelined".to_string(),
            max_concurrent_calls: 4,
            tools: "all".to_string(),
            include: Vec::new(),
        }
    }
}

impl FileTurnConfig {
    pub fn parse_max_depth(&self) -> (usize, Vec<ConfigIssue>) {
        if self.max_depth == 0 {
            let issue = ConfigIssue::warning(
                ConfigIssueCode::ZeroBound,
                "turn.max_depth cannot be 0, falling back to 10",
            );
            return (10, vec![issue]);
        }
        (self.max_depth, vec![])
    }

    /// Accepts: "sequential", "seq", "pipelined", "pipeline"
    pub fn parse_policy(&self) -> (ToolCallPolicy, Vec<ConfigIssue>) {
        let pipelined = ToolCallPolicy::Pipelined {
            max_concurrent: self.max_concurrent_calls.max(1),
        };
        match self.tool_call_policy.to_lowercase().as_str() {
            "sequential" | "seq" => (ToolCallPolicy::Sequential, vec![]),
            "pipelined" | "pipeline" => (pipelined, vec![]),
            other => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::UnknownToolCallPolicy,
                    format!(
                        "turn.tool_call_policy: unknown value '{}', falling back to 'pipelined'",
                        other
                    ),
                );
                (pipelined, vec![issue])
            }
        }
    }

    pub fn parse_inclusion(&self) -> (ToolInclusion, Vec<ConfigIssue>) {
        if !self.include.is_empty() {
            return (ToolInclusion::Named(self.include.clone()), vec![]);
        }
        match self.tools.to_lowercase().replace('-', "_").as_str() {
            "all" => (ToolInclusion::All, vec![]),
            "none" => (ToolInclusion::None, vec![]),
            "read_only" | "readonly" => (ToolInclusion::ReadOnly, vec![]),
            _ => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::UnknownToolTag,
                    format!("turn.tools: unknown value '{}', falling back to 'all'", self.tools),
                );
                (ToolInclusion::All, vec![issue])
            }
        }
    }
}

/// Raw adaptive-loop configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAdaptiveConfig {
    /// Maximum attempts per task
    pub bound: u32,
    /// Consecutive retries before escalation (unset = never escalate)
    pub escalate_after: Option<u32>,
}

impl Default for FileAdaptiveConfig {
    fn default() -> Self {
        let defaults = AdaptiveDefaults::default();
        Self {
            bound: defaults.bound,
            escalate_after: defaults.escalate_after,
        }
    }
}

impl FileAdaptiveConfig {
    pub fn to_defaults(&self) -> (AdaptiveDefaults, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let bound = if self.bound == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroBound,
                "adaptive.bound cannot be 0, falling back to 3",
            ));
            AdaptiveDefaults::default().bound
        } else {
            self.bound
        };
        let escalate_after = match self.escalate_after {
            Some(0) => {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::ZeroBound,
                    "adaptive.escalate_after cannot be 0, escalation disabled",
                ));
                None
            }
            other => other,
        };
        (
            AdaptiveDefaults {
                bound,
                escalate_after,
            },
            issues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_quota_is_error() {
        let config = FileQuotasConfig {
            max_concurrent_executions: 0,
            ..Default::default()
        };
        let (quotas, issues) = config.to_quota_config();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
        assert_eq!(quotas.max_concurrent_executions, Some(1));
    }

    #[test]
    fn test_policy_parsing() {
        let mut config = FileTurnConfig::default();
        assert_eq!(
            config.parse_policy().0,
            ToolCallPolicy::Pipelined { max_concurrent: 4 }
        );

        config.tool_call_policy = "seq".to_string();
        assert_eq!(config.parse_policy().0, ToolCallPolicy::Sequential);

        config.tool_call_policy = "parallel-ish".to_string();
        let (policy, issues) = config.parse_policy();
        assert_eq!(policy, ToolCallPolicy::Pipelined { max_concurrent: 4 });
        assert_eq!(issues[0].code, ConfigIssueCode::UnknownToolCallPolicy);
    }

    #[test]
    fn test_inclusion_named_overrides_mode() {
        let config = FileTurnConfig {
            tools: "none".to_string(),
            include: vec!["echo".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.parse_inclusion().0,
            ToolInclusion::Named(vec!["echo".to_string()])
        );

        let config = FileTurnConfig {
            tools: "read-only".to_string(),
            ..Default::default()
        };
        assert_eq!(config.parse_inclusion().0, ToolInclusion::ReadOnly);
    }

    #[test]
    fn test_admission_policy_conversion() {
        let config = FileExecutionConfig {
            admission_wait_secs: 5,
            admission_retries: 4,
            admission_backoff_ms: 250,
            ..Default::default()
        };
        let (policy, issues) = config.to_admission_policy();
        assert!(issues.is_empty());
        assert_eq!(policy.wait_timeout, Duration::from_secs(5));
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_adaptive_zero_values() {
        let config = FileAdaptiveConfig {
            bound: 0,
            escalate_after: Some(0),
        };
        let (defaults, issues) = config.to_defaults();
        assert_eq!(defaults.bound, 3);
        assert_eq!(defaults.escalate_after, None);
        assert_eq!(issues.len(), 2);
    }
}
