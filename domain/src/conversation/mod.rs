//! Conversation domain: the append-only history owned by the turn manager
//! and the fragments the model boundary streams into it.

pub mod history;
pub mod stream;

pub use history::{ConversationHistory, HistoryEntry};
pub use stream::{StreamFragment, ToolCallRequest};
