//! Infrastructure layer for tool-relay
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod adaptive;
pub mod config;
pub mod logging;
pub mod model;
pub mod tools;

// Re-export commonly used types
pub use adaptive::{CandidateSuggester, RuleBasedEvaluator};
pub use config::{ConfigLoader, ConfigSource, ConfigValidationError, FileConfig, SourceKind};
pub use logging::JsonlConversationLogger;
pub use model::{ModelScript, ScriptError, ScriptedModelGateway};
pub use tools::{
    CommandToolProvider, FunctionTool, FunctionToolProvider, JsonSchemaToolConverter,
    LoopbackTransport, RemoteToolProvider, ToolTransport, builtin_provider,
};
