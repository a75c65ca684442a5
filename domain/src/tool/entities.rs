//! Tool domain entities

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::execution::CallFingerprint;

/// Risk level of a tool operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk - no confirmation needed under the default approval mode
    #[default]
    Low,
    /// High risk - requires confirmation under the default approval mode
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::High => "high",
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, RiskLevel::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a tool does to the world, independent of how risky it is.
///
/// `Edit` and `Execute` are mutating; `PlanOnly` sessions deny both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Observes state only (lookups, probes, reads)
    #[default]
    Read,
    /// Modifies files or stored data
    Edit,
    /// Runs arbitrary actions (commands, remote side effects)
    Execute,
}

impl ToolCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ToolCategory::Read => "read",
            ToolCategory::Edit => "edit",
            ToolCategory::Execute => "execute",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, ToolCategory::Read)
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Definition of a tool that can be invoked by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name of the tool (e.g., "dns_lookup")
    pub name: String,
    /// Descriptor version; re-registering the same version is a no-op
    pub version: String,
    /// Human-readable description
    pub description: String,
    /// Risk level of this tool
    pub risk_level: RiskLevel,
    /// Category used for mutating / edit-class checks
    #[serde(default)]
    pub category: ToolCategory,
    /// Parameter specifications (the input schema)
    pub parameters: Vec<ToolParameter>,
    /// Per-tool execution timeout, overriding the session default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Parameter specification for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name
    pub name: String,
    /// Parameter description
    pub description: String,
    /// Whether this parameter is required
    pub required: bool,
    /// Parameter type hint (e.g., "string", "path", "integer", "number")
    pub param_type: String,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            description: description.into(),
            risk_level,
            category: ToolCategory::Read,
            parameters: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk_level.requires_confirmation()
    }

    pub fn is_mutating(&self) -> bool {
        self.category.is_mutating()
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_ms.map(std::time::Duration::from_millis)
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            param_type: "string".to_string(),
        }
    }

    pub fn with_type(mut self, param_type: impl Into<String>) -> Self {
        self.param_type = param_type.into();
        self
    }
}

/// Which registered tools are advertised to the model boundary
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "names")]
pub enum ToolInclusion {
    #[default]
    All,
    None,
    /// Only non-mutating tools
    ReadOnly,
    Named(Vec<String>),
}

impl ToolInclusion {
    pub fn includes(&self, tool: &ToolDefinition) -> bool {
        match self {
            ToolInclusion::All => true,
            ToolInclusion::None => false,
            ToolInclusion::ReadOnly => !tool.is_mutating(),
            ToolInclusion::Named(names) => names.iter().any(|n| n == &tool.name),
        }
    }
}

/// Snapshot of tool definitions in registration order
#[derive(Debug, Clone, Default)]
pub struct ToolSpec {
    tools: HashMap<String, ToolDefinition>,
    order: Vec<String>,
}

impl ToolSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a definition (builder pattern).
    ///
    /// A replaced definition keeps its original position.
    pub fn register(mut self, tool: ToolDefinition) -> Self {
        if !self.tools.contains_key(&tool.name) {
            self.order.push(tool.name.clone());
        }
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// All definitions, in insertion order
    pub fn all(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn high_risk_tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.all().filter(|t| t.is_high_risk())
    }

    pub fn low_risk_tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.all().filter(|t| !t.is_high_risk())
    }

    pub fn mutating_tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.all().filter(|t| t.is_mutating())
    }

    /// Definitions admitted by an inclusion policy, in insertion order
    pub fn select(&self, inclusion: &ToolInclusion) -> Vec<ToolDefinition> {
        self.all().filter(|t| inclusion.includes(t)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// A call to a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, unique within its turn
    pub id: String,
    /// Name of the tool to call
    pub tool_name: String,
    /// Arguments to pass to the tool
    pub arguments: HashMap<String, Value>,
    /// Turn that emitted this call
    pub turn_id: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: HashMap::new(),
            turn_id: String::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_arguments(mut self, arguments: HashMap<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn in_turn(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = turn_id.into();
        self
    }

    /// Get a string argument
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }

    /// Get a required string argument
    pub fn require_string(&self, key: &str) -> Result<&str, String> {
        self.get_string(key)
            .ok_or_else(|| format!("Missing required argument: {}", key))
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.arguments.get(key).and_then(|v| v.as_u64())
    }

    /// Identity used for duplicate-call suppression within a turn
    pub fn fingerprint(&self) -> CallFingerprint {
        CallFingerprint::of(&self.tool_name, &self.arguments)
    }
}
