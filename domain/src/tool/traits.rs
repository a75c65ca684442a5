//! Tool domain traits
//!
//! Contains pure domain logic traits for tool validation.
//! The async invocation boundary is defined in the application layer (ports).

use serde_json::Value;

use super::entities::{ToolCall, ToolDefinition};

/// Validator for tool calls
///
/// This is a pure domain trait that validates tool calls
/// against their definitions without any I/O operations.
pub trait ToolValidator: Send + Sync {
    /// Validate a tool call against its definition
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), String>;
}

/// Default implementation of ToolValidator
///
/// Checks required parameters, rejects unknown parameters, and checks each
/// argument's JSON type against the declared `param_type`. Unrecognized type
/// hints accept any value.
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), String> {
        for param in &definition.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(format!(
                    "Missing required parameter '{}' for tool '{}'",
                    param.name, definition.name
                ));
            }
        }

        // Sorted so the reported error is deterministic
        let mut names: Vec<&String> = call.arguments.keys().collect();
        names.sort();

        for arg_name in names {
            let Some(param) = definition.parameter(arg_name) else {
                return Err(format!(
                    "Unknown parameter '{}' for tool '{}'",
                    arg_name, definition.name
                ));
            };
            let value = &call.arguments[arg_name];
            if !type_matches(&param.param_type, value) {
                return Err(format!(
                    "Parameter '{}' for tool '{}' expects {}, got {}",
                    arg_name,
                    definition.name,
                    param.param_type,
                    json_type_name(value)
                ));
            }
        }

        Ok(())
    }
}

fn type_matches(param_type: &str, value: &Value) -> bool {
    match param_type {
        "string" | "path" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
