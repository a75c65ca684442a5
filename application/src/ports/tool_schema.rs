//! Tool schema conversion port.
//!
//! Separates "which tools are offered" (registry + inclusion policy) from
//! "how they are serialized" for a model boundary that wants JSON Schema.

use relay_domain::ToolDefinition;

pub trait ToolSchemaPort: Send + Sync {
    /// Convert a single tool definition to provider-neutral JSON Schema.
    fn tool_to_schema(&self, tool: &ToolDefinition) -> serde_json::Value;

    /// Convert a set of tools to a JSON Schema array (sorted by name).
    fn tools_schema(&self, tools: &[ToolDefinition]) -> Vec<serde_json::Value>;
}
