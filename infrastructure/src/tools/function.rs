//! In-process function tools.
//!
//! A [`FunctionTool`] wraps an async closure as a [`ToolHandle`].
//! [`FunctionToolProvider`] offers a fixed set of them to discovery, and
//! [`builtin_provider`] carries the demo tools the CLI ships with.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use relay_application::{ProviderError, ToolDescriptor, ToolHandle, ToolProvider};
use relay_domain::{RiskLevel, ToolCall, ToolCategory, ToolDefinition, ToolError, ToolParameter};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Priority of in-process tools (highest; they shadow commands and remotes)
pub const FUNCTION_PRIORITY: i32 = 100;

type InvokeFn =
    dyn Fn(ToolCall, CancellationToken) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync;

/// A tool backed by an async closure
pub struct FunctionTool {
    f: Box<InvokeFn>,
}

impl FunctionTool {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ToolCall, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            f: Box::new(move |call, cancel| f(call, cancel).boxed()),
        }
    }
}

#[async_trait]
impl ToolHandle for FunctionTool {
    async fn invoke(&self, call: &ToolCall, cancel: CancellationToken) -> Result<Value, ToolError> {
        (self.f)(call.clone(), cancel).await
    }
}

/// Fixed set of in-process tools
pub struct FunctionToolProvider {
    id: String,
    descriptors: Vec<ToolDescriptor>,
}

impl FunctionToolProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            descriptors: Vec::new(),
        }
    }

    pub fn with_tool<F, Fut>(mut self, definition: ToolDefinition, f: F) -> Self
    where
        F: Fn(ToolCall, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handle = Arc::new(FunctionTool::new(f));
        self.descriptors
            .push(ToolDescriptor::new(definition, handle).with_source(self.id.clone()));
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[async_trait]
impl ToolProvider for FunctionToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Function Tools"
    }

    fn priority(&self) -> i32 {
        FUNCTION_PRIORITY
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn discover(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        Ok(self.descriptors.clone())
    }
}

// ==================== Built-in tools ====================

pub const ECHO: &str = "echo";
pub const SLEEP: &str = "sleep";

/// `echo` and `sleep`, both read-only
pub fn builtin_provider() -> FunctionToolProvider {
    FunctionToolProvider::new("builtin")
        .with_tool(echo_definition(), |call, _| async move { echo(call) })
        .with_tool(sleep_definition(), sleep)
}

fn echo_definition() -> ToolDefinition {
    ToolDefinition::new(ECHO, "Return the given message unchanged", RiskLevel::Low)
        .with_category(ToolCategory::Read)
        .with_parameter(ToolParameter::new("message", "Text to echo back", true))
}

fn sleep_definition() -> ToolDefinition {
    ToolDefinition::new(SLEEP, "Wait for the given number of milliseconds", RiskLevel::Low)
        .with_category(ToolCategory::Read)
        .with_parameter(
            ToolParameter::new("ms", "Milliseconds to wait", true).with_type("integer"),
        )
}

fn echo(call: ToolCall) -> Result<Value, ToolError> {
    let message = call
        .require_string("message")
        .map_err(ToolError::invalid_argument)?;
    Ok(json!({ "message": message }))
}

async fn sleep(call: ToolCall, cancel: CancellationToken) -> Result<Value, ToolError> {
    let ms = call
        .get_u64("ms")
        .ok_or_else(|| ToolError::invalid_argument("'ms' must be a non-negative integer"))?;
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(json!({ "slept_ms": ms })),
        _ = cancel.cancelled() => Err(ToolError::cancelled(SLEEP)),
    }
}
