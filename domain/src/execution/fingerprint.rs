//! Argument fingerprints for duplicate-call suppression.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Identity of a (tool, arguments) pair.
///
/// Arguments are rendered as canonical JSON: object keys sorted at every
/// nesting level, so `{"a":1,"b":2}` and `{"b":2,"a":1}` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallFingerprint {
    pub tool_name: String,
    pub canonical_args: String,
}

impl CallFingerprint {
    pub fn of(tool_name: &str, arguments: &HashMap<String, Value>) -> Self {
        let mut entries: Vec<_> = arguments.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let object: Map<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k.clone(), canonicalize(v)))
            .collect();
        Self {
            tool_name: tool_name.to_string(),
            canonical_args: Value::Object(object).to_string(),
        }
    }
}

impl std::fmt::Display for CallFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.tool_name, self.canonical_args)
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
