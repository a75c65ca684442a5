//! Tools configuration from TOML (`[tools]` section)
//!
//! Command tools wrap a shell command template with `{param}` placeholders.
//!
//! ```toml
//! [tools]
//! builtin = true
//!
//! [[tools.command]]
//! name = "dns_lookup"
//! description = "Resolve a domain name"
//! command = "dig +short {domain}"
//! risk_level = "low"
//! category = "read"
//! timeout_secs = 10
//!
//! [[tools.command.parameters]]
//! name = "domain"
//! description = "Domain to resolve"
//! required = true
//! ```

use relay_domain::{ConfigIssue, ConfigIssueCode, RiskLevel, ToolCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Raw tools configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Register the built-in demo tools (`echo`, `sleep`)
    pub builtin: bool,
    /// Command-backed tools
    pub command: Vec<FileCommandToolConfig>,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            command: Vec::new(),
        }
    }
}

impl FileToolsConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for tool in &self.command {
            if !seen.insert(tool.name.as_str()) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateCommandTool,
                    format!("tools.command: '{}' is defined more than once", tool.name),
                ));
            }
            issues.extend(tool.parse_risk_level().1);
            issues.extend(tool.parse_category().1);
        }
        issues
    }
}

/// One `[[tools.command]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCommandToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Command template; `{param}` placeholders are shell-escaped
    pub command: String,
    /// "low" or "high" (default: high)
    #[serde(default = "default_risk_level")]
    pub risk_level: String,
    /// "read", "edit" or "execute" (default: execute)
    #[serde(default = "default_category")]
    pub category: String,
    /// Per-tool execution timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub parameters: Vec<FileCommandToolParameter>,
}

fn default_risk_level() -> String {
    "high".to_string()
}

fn default_category() -> String {
    "execute".to_string()
}

impl FileCommandToolConfig {
    /// Unknown values fall back to `High` (safe side).
    pub fn parse_risk_level(&self) -> (RiskLevel, Vec<ConfigIssue>) {
        match self.risk_level.to_lowercase().as_str() {
            "low" => (RiskLevel::Low, vec![]),
            "high" => (RiskLevel::High, vec![]),
            other => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::UnknownToolTag,
                    format!(
                        "tools.command '{}': unknown risk_level '{}', treating as 'high'",
                        self.name, other
                    ),
                );
                (RiskLevel::High, vec![issue])
            }
        }
    }

    /// Unknown values fall back to `Execute` (safe side).
    pub fn parse_category(&self) -> (ToolCategory, Vec<ConfigIssue>) {
        match self.category.to_lowercase().as_str() {
            "read" => (ToolCategory::Read, vec![]),
            "edit" => (ToolCategory::Edit, vec![]),
            "execute" => (ToolCategory::Execute, vec![]),
            other => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::UnknownToolTag,
                    format!(
                        "tools.command '{}': unknown category '{}', treating as 'execute'",
                        self.name, other
                    ),
                );
                (ToolCategory::Execute, vec![issue])
            }
        }
    }
}

/// One `[[tools.command.parameters]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCommandToolParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_param_type", rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_param_type() -> String {
    "string".to_string()
}
