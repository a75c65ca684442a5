//! Test doubles shared by the engine's unit tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use relay_domain::{RiskLevel, ToolCall, ToolCategory, ToolDefinition, ToolError, ToolParameter};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::ports::tool_handle::{ToolDescriptor, ToolHandle};

type BoxedInvoke = Box<
    dyn Fn(ToolCall, CancellationToken) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>
        + Send
        + Sync,
>;

/// Closure-backed tool that counts invocations and tracks peak concurrency.
pub(crate) struct FnTool {
    f: BoxedInvoke,
    invocations: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FnTool {
    pub(crate) fn new<F, Fut>(f: F) -> Arc<Self>
    where
        F: Fn(ToolCall, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Arc::new(Self {
            f: Box::new(move |call, token| Box::pin(f(call, token))),
            invocations: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub(crate) fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHandle for FnTool {
    async fn invoke(&self, call: &ToolCall, cancel: CancellationToken) -> Result<Value, ToolError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = (self.f)(call.clone(), cancel).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Returns its arguments as the payload.
pub(crate) fn echo_tool() -> Arc<FnTool> {
    FnTool::new(|call, _| async move { Ok(json!(call.arguments)) })
}

/// Sleeps for the `ms` argument (default 100), observing cancellation.
pub(crate) fn sleep_tool() -> Arc<FnTool> {
    FnTool::new(|call, cancel| async move {
        let ms = call.get_u64("ms").unwrap_or(100);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(json!({ "slept_ms": ms })),
            _ = cancel.cancelled() => Err(ToolError::cancelled("sleep")),
        }
    })
}

/// Sleeps for the `ms` argument and ignores cancellation.
pub(crate) fn stubborn_tool() -> Arc<FnTool> {
    FnTool::new(|call, _| async move {
        let ms = call.get_u64("ms").unwrap_or(100);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(json!({ "slept_ms": ms }))
    })
}

/// Descriptor accepting optional `domain` (string), `ms` (integer) and
/// `value` (any) parameters.
pub(crate) fn descriptor(
    name: &str,
    risk: RiskLevel,
    category: ToolCategory,
    handle: Arc<FnTool>,
) -> ToolDescriptor {
    let definition = ToolDefinition::new(name, format!("{name} (test)"), risk)
        .with_category(category)
        .with_parameter(ToolParameter::new("domain", "Domain", false))
        .with_parameter(ToolParameter::new("ms", "Milliseconds", false).with_type("integer"))
        .with_parameter(ToolParameter::new("value", "Anything", false).with_type("any"));
    ToolDescriptor::new(definition, handle)
}

/// Scheduler over a fresh registry holding `tools`, auto-approving
/// confirmations.
pub(crate) fn scheduler(
    config: &crate::config::SessionConfig,
    tools: Vec<ToolDescriptor>,
) -> crate::execution::ToolExecutionScheduler {
    use crate::execution::{ResourceManager, ToolExecutionScheduler, ToolRegistry};
    use crate::ports::confirmation::AutoApproveConfirmation;

    let registry = Arc::new(ToolRegistry::new());
    for tool in tools {
        registry.register_replacing(tool);
    }
    ToolExecutionScheduler::new(
        registry,
        Arc::new(ResourceManager::new(&config.quotas)),
        Arc::new(AutoApproveConfirmation),
        config,
    )
}
