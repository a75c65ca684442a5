//! JSON Schema tool converter.
//!
//! Default implementation of [`ToolSchemaPort`] that produces provider-neutral
//! JSON Schema for a model boundary.

use relay_application::ToolSchemaPort;
use relay_domain::ToolDefinition;
use serde_json::{Map, Value, json};

/// Default implementation producing provider-neutral JSON Schema.
///
/// Handles param_type → JSON Schema type mapping:
/// - `"string"`, `"path"` → `"string"`
/// - `"number"`, `"integer"`, `"boolean"`, `"object"`, `"array"` → same name
/// - `"any"` → no `type` constraint
/// - anything else → `"string"`
pub struct JsonSchemaToolConverter;

fn schema_type(param_type: &str) -> Option<&'static str> {
    match param_type {
        "string" | "path" => Some("string"),
        "number" => Some("number"),
        "integer" => Some("integer"),
        "boolean" => Some("boolean"),
        "object" => Some("object"),
        "array" => Some("array"),
        "any" => None,
        _ => Some("string"),
    }
}

impl ToolSchemaPort for JsonSchemaToolConverter {
    fn tool_to_schema(&self, tool: &ToolDefinition) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &tool.parameters {
            let mut prop = Map::new();
            if let Some(ty) = schema_type(&param.param_type) {
                prop.insert("type".to_string(), json!(ty));
            }
            prop.insert("description".to_string(), json!(param.description));
            properties.insert(param.name.clone(), Value::Object(prop));

            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }
        })
    }

    fn tools_schema(&self, tools: &[ToolDefinition]) -> Vec<Value> {
        let mut sorted: Vec<&ToolDefinition> = tools.iter().collect();
        sorted.sort_by_key(|t| &t.name);
        sorted.into_iter().map(|t| self.tool_to_schema(t)).collect()
    }
}
