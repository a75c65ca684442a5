//! Fragments streamed from the model boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A tool-call request already normalized to (name, arguments)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Id assigned by the model boundary, if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// One element of the lazy per-turn fragment sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    ContentDelta { text: String },
    ToolCallRequest(ToolCallRequest),
    TurnComplete,
    StreamError { message: String },
}

impl StreamFragment {
    pub fn content(text: impl Into<String>) -> Self {
        StreamFragment::ContentDelta { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamFragment::StreamError {
            message: message.into(),
        }
    }

    /// Text carried by a content delta
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamFragment::ContentDelta { text } => Some(text),
            _ => None,
        }
    }

    /// Whether no further fragments follow in this segment
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamFragment::TurnComplete | StreamFragment::StreamError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_json_shape() {
        let json = r#"[
            {"type": "content_delta", "text": "Looking up"},
            {"type": "tool_call_request", "name": "dns_lookup", "arguments": {"domain": "example.org"}},
            {"type": "turn_complete"},
            {"type": "stream_error", "message": "connection reset"}
        ]"#;
        let fragments: Vec<StreamFragment> = serde_json::from_str(json).unwrap();
        assert_eq!(fragments[0].text(), Some("Looking up"));
        match &fragments[1] {
            StreamFragment::ToolCallRequest(req) => {
                assert_eq!(req.name, "dns_lookup");
                assert!(req.id.is_none());
                assert_eq!(req.arguments["domain"], "example.org");
            }
            other => panic!("unexpected fragment {other:?}"),
        }
        assert!(fragments[2].is_terminal());
        assert!(fragments[3].is_terminal());
        assert!(!fragments[0].is_terminal());
    }
}
