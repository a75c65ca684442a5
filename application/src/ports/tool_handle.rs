//! Tool invocation port
//!
//! A [`ToolHandle`] is the opaque capability behind a registered tool.
//! Local functions, command runners and remote protocol clients all sit
//! behind this one interface; the scheduler never knows which it calls.

use async_trait::async_trait;
use relay_domain::{ToolCall, ToolDefinition, ToolError};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Invoker for one tool.
///
/// The scheduler enforces the execution timeout; implementations should
/// observe `cancel` at their suspension points and return promptly.
#[async_trait]
pub trait ToolHandle: Send + Sync {
    async fn invoke(&self, call: &ToolCall, cancel: CancellationToken) -> Result<Value, ToolError>;
}

/// A tool definition paired with its capability handle.
///
/// Immutable once registered; the registry hands out clones.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub definition: ToolDefinition,
    pub handle: Arc<dyn ToolHandle>,
    /// Discovery source that produced this descriptor (e.g., "builtin", "command")
    pub source: String,
}

impl ToolDescriptor {
    pub fn new(definition: ToolDefinition, handle: Arc<dyn ToolHandle>) -> Self {
        Self {
            definition,
            handle,
            source: "builtin".to_string(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn version(&self) -> &str {
        &self.definition.version
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("definition", &self.definition)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
