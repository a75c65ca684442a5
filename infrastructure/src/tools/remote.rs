//! Remote tools over a request/response protocol.
//!
//! # Protocol
//!
//! - **List**: the transport returns the tool definitions the remote side offers
//! - **Call**: [`RemoteRequest`] `{ id, tool, arguments }` →
//!   [`RemoteResponse`] `Ok { payload }` or `Err { code, message }`
//!
//! The wire itself (stdio, sockets, HTTP) lives behind [`ToolTransport`].
//! [`LoopbackTransport`] serves in-process handles through the same JSON
//! encoding and is what the tests use.

use async_trait::async_trait;
use relay_application::{ProviderError, ToolDescriptor, ToolHandle, ToolProvider};
use relay_domain::{ToolCall, ToolDefinition, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Priority of remote tools (lowest of the built-in sources)
pub const REMOTE_PRIORITY: i32 = 50;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Call request sent to the remote side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub id: u64,
    pub tool: String,
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl RemoteRequest {
    /// Creates a request with an auto-generated ID.
    pub fn new(tool: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            id: REQUEST_ID.fetch_add(1, Ordering::SeqCst),
            tool: tool.into(),
            arguments,
        }
    }
}

/// Reply to a [`RemoteRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteResponse {
    Ok { payload: Value },
    Err { code: String, message: String },
}

/// The transport could not deliver a request or a reply
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Carries protocol messages to one remote tool server
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Name of the remote server (used in the provider id)
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, TransportError>;

    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError>;

    async fn is_connected(&self) -> bool;
}

/// Handle for one remote tool
struct RemoteToolHandle {
    transport: Arc<dyn ToolTransport>,
}

#[async_trait]
impl ToolHandle for RemoteToolHandle {
    async fn invoke(&self, call: &ToolCall, cancel: CancellationToken) -> Result<Value, ToolError> {
        let request = RemoteRequest::new(call.tool_name.as_str(), call.arguments.clone());
        let request_id = request.id;
        debug!(tool = %call.tool_name, call_id = %call.id, request_id, "Sending remote call");

        let response = tokio::select! {
            response = self.transport.call(request) => response,
            _ = cancel.cancelled() => return Err(ToolError::cancelled(call.tool_name.as_str())),
        };

        match response {
            Ok(RemoteResponse::Ok { payload }) => Ok(payload),
            Ok(RemoteResponse::Err { code, message }) => Err(ToolError::new(code, message)),
            Err(e) => {
                warn!(tool = %call.tool_name, request_id, error = %e, "Remote call failed");
                Err(ToolError::unavailable(format!("{}: {e}", self.transport.name())))
            }
        }
    }
}

/// Provider exposing every tool of one remote server
pub struct RemoteToolProvider {
    id: String,
    transport: Arc<dyn ToolTransport>,
}

impl RemoteToolProvider {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self {
            id: format!("remote:{}", transport.name()),
            transport,
        }
    }
}

#[async_trait]
impl ToolProvider for RemoteToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> i32 {
        REMOTE_PRIORITY
    }

    async fn is_available(&self) -> bool {
        self.transport.is_connected().await
    }

    async fn discover(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let definitions = self
            .transport
            .list_tools()
            .await
            .map_err(|e| ProviderError::DiscoveryFailed(e.to_string()))?;

        let handle: Arc<dyn ToolHandle> = Arc::new(RemoteToolHandle {
            transport: self.transport.clone(),
        });
        Ok(definitions
            .into_iter()
            .map(|definition| ToolDescriptor::new(definition, handle.clone()))
            .collect())
    }
}

// ==================== Loopback ====================

/// In-process transport serving local handles.
///
/// Requests and replies are encoded to JSON and decoded again, so the
/// protocol types are exercised exactly as on a wire.
pub struct LoopbackTransport {
    name: String,
    tools: HashMap<String, (ToolDefinition, Arc<dyn ToolHandle>)>,
    closed: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: HashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_tool(mut self, definition: ToolDefinition, handle: Arc<dyn ToolHandle>) -> Self {
        self.tools.insert(definition.name.clone(), (definition, handle));
        self
    }

    /// Simulate the server going away
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn round_trip<T>(value: &T) -> Result<T, TransportError>
    where
        T: Serialize + for<'de> Deserialize<'de>,
    {
        let encoded =
            serde_json::to_vec(value).map_err(|e| TransportError::Protocol(e.to_string()))?;
        serde_json::from_slice(&encoded).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl ToolTransport for LoopbackTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, TransportError> {
        self.ensure_open()?;
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|(d, _)| d.clone()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Self::round_trip(&definitions)
    }

    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, TransportError> {
        self.ensure_open()?;
        let request = Self::round_trip(&request)?;

        let response = match self.tools.get(&request.tool) {
            None => RemoteResponse::Err {
                code: "NOT_FOUND".to_string(),
                message: format!("Remote tool not found: {}", request.tool),
            },
            Some((_, handle)) => {
                let call = ToolCall::new(format!("remote-{}", request.id), request.tool.as_str())
                    .with_arguments(request.arguments);
                match handle.invoke(&call, CancellationToken::new()).await {
                    Ok(payload) => RemoteResponse::Ok { payload },
                    Err(e) => RemoteResponse::Err {
                        code: e.code,
                        message: e.message,
                    },
                }
            }
        };
        Self::round_trip(&response)
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::function::FunctionTool;
    use relay_domain::{RiskLevel, ToolParameter};
    use serde_json::json;
    use std::time::Duration;

    fn lookup_definition() -> ToolDefinition {
        ToolDefinition::new("dns_lookup", "Resolve a domain", RiskLevel::Low)
            .with_parameter(ToolParameter::new("domain", "Domain", true))
    }

    fn transport() -> Arc<LoopbackTransport> {
        let lookup = FunctionTool::new(|call, _| async move {
            match call.get_string("domain") {
                Some("example.org") => Ok(json!({ "address": "93.184.216.34" })),
                Some(other) => Err(ToolError::new("NXDOMAIN", format!("{other} does not exist"))),
                None => Err(ToolError::invalid_argument("domain required")),
            }
        });
        let hang = FunctionTool::new(|_, _| async move {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        });
        Arc::new(
            LoopbackTransport::new("ops")
                .with_tool(lookup_definition(), Arc::new(lookup))
                .with_tool(ToolDefinition::new("hang", "Never answers", RiskLevel::Low), Arc::new(hang)),
        )
    }

    async fn descriptor(provider: &RemoteToolProvider, name: &str) -> ToolDescriptor {
        provider
            .discover()
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.name() == name)
            .unwrap()
    }

    #[test]
    fn test_response_wire_format() {
        let ok = RemoteResponse::Ok { payload: json!(1) };
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"status": "ok", "payload": 1}));

        let err: RemoteResponse =
            serde_json::from_str(r#"{"status":"err","code":"TIMEOUT","message":"slow"}"#).unwrap();
        assert_eq!(
            err,
            RemoteResponse::Err {
                code: "TIMEOUT".into(),
                message: "slow".into()
            }
        );
    }

    #[test]
    fn test_request_ids_increase() {
        let a = RemoteRequest::new("t", HashMap::new());
        let b = RemoteRequest::new("t", HashMap::new());
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_discover_lists_remote_tools() {
        let provider = RemoteToolProvider::new(transport());
        assert_eq!(provider.id(), "remote:ops");
        assert_eq!(provider.priority(), REMOTE_PRIORITY);
        assert!(provider.is_available().await);

        let names: Vec<String> = provider
            .discover()
            .await
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["dns_lookup".to_string(), "hang".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_call_ok_and_err() {
        let provider = RemoteToolProvider::new(transport());
        let lookup = descriptor(&provider, "dns_lookup").await;

        let ok = ToolCall::new("c1", "dns_lookup").with_arg("domain", "example.org");
        let payload = lookup.handle.invoke(&ok, CancellationToken::new()).await.unwrap();
        assert_eq!(payload["address"], "93.184.216.34");

        let missing = ToolCall::new("c2", "dns_lookup").with_arg("domain", "nope.invalid");
        let err = lookup
            .handle
            .invoke(&missing, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "NXDOMAIN");
        assert_eq!(err.message, "nope.invalid does not exist");
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let transport = transport();
        let provider = RemoteToolProvider::new(transport.clone());
        let lookup = descriptor(&provider, "dns_lookup").await;

        transport.close();
        assert!(!provider.is_available().await);
        assert!(matches!(
            provider.discover().await,
            Err(ProviderError::DiscoveryFailed(_))
        ));

        let call = ToolCall::new("c1", "dns_lookup").with_arg("domain", "example.org");
        let err = lookup.handle.invoke(&call, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, "UNAVAILABLE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_pending_call() {
        let provider = RemoteToolProvider::new(transport());
        let hang = descriptor(&provider, "hang").await;
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });
        let err = hang
            .handle
            .invoke(&ToolCall::new("c1", "hang"), token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
