//! Append-only conversation history.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::execution::{CallFailure, ToolCallOutcome, ToolCallState};

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    UserMessage {
        text: String,
    },
    /// Model text accumulated from content deltas
    ModelContent {
        text: String,
    },
    ToolCallRecord {
        call_id: String,
        tool_name: String,
        arguments: HashMap<String, Value>,
    },
    ToolResultRecord {
        call_id: String,
        tool_name: String,
        state: ToolCallState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<CallFailure>,
    },
}

impl HistoryEntry {
    pub fn tool_result(outcome: &ToolCallOutcome) -> Self {
        HistoryEntry::ToolResultRecord {
            call_id: outcome.call_id.clone(),
            tool_name: outcome.tool_name.clone(),
            state: outcome.state,
            payload: outcome.payload().cloned(),
            failure: outcome.failure().cloned(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::UserMessage { .. } => "user_message",
            HistoryEntry::ModelContent { .. } => "model_content",
            HistoryEntry::ToolCallRecord { .. } => "tool_call_record",
            HistoryEntry::ToolResultRecord { .. } => "tool_result_record",
        }
    }

    /// Call id of tool call / tool result records
    pub fn call_id(&self) -> Option<&str> {
        match self {
            HistoryEntry::ToolCallRecord { call_id, .. }
            | HistoryEntry::ToolResultRecord { call_id, .. } => Some(call_id),
            _ => None,
        }
    }
}

/// Ordered, append-only sequence of conversation entries.
///
/// Entries can only be appended; the length never decreases within a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_user(text: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.push_user(text);
        history
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.append(HistoryEntry::UserMessage { text: text.into() });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Call ids of tool result records, in append order
    pub fn result_order(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| matches!(e, HistoryEntry::ToolResultRecord { .. }))
            .filter_map(|e| e.call_id())
            .collect()
    }

    /// Entries appended since `len` entries were present
    pub fn since(&self, len: usize) -> &[HistoryEntry] {
        &self.entries[len.min(self.entries.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(call_id: &str, result: Result<Value, CallFailure>) -> ToolCallOutcome {
        let state = match &result {
            Ok(_) => ToolCallState::Completed,
            Err(f) => f.kind.terminal_state(),
        };
        ToolCallOutcome {
            call_id: call_id.to_string(),
            tool_name: "probe".to_string(),
            arguments: HashMap::new(),
            state,
            result,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_append_only_growth() {
        let mut history = ConversationHistory::from_user("check example.org");
        assert_eq!(history.len(), 1);

        history.append(HistoryEntry::ModelContent {
            text: "probing".into(),
        });
        history.append(HistoryEntry::tool_result(&outcome(
            "a",
            Ok(serde_json::json!({"status": 200})),
        )));
        history.append(HistoryEntry::tool_result(&outcome(
            "b",
            Err(CallFailure::approval_denied("denied")),
        )));

        assert_eq!(history.len(), 4);
        assert_eq!(history.result_order(), vec!["a", "b"]);
        assert_eq!(history.since(2).len(), 2);
        assert_eq!(history.since(10).len(), 0);
        assert_eq!(history.last().unwrap().kind(), "tool_result_record");
    }

    #[test]
    fn test_tool_result_record_fields() {
        let entry = HistoryEntry::tool_result(&outcome("b", Err(CallFailure::cancelled("turn"))));
        match entry {
            HistoryEntry::ToolResultRecord {
                state,
                payload,
                failure,
                ..
            } => {
                assert_eq!(state, ToolCallState::Cancelled);
                assert!(payload.is_none());
                assert_eq!(failure.unwrap().message, "turn");
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_history_serializes_with_kind_tag() {
        let history = ConversationHistory::from_user("hi");
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["entries"][0]["kind"], "user_message");
    }
}
