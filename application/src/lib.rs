//! Application layer for tool-relay
//!
//! This crate contains the execution engine (registry, resource manager,
//! approval gate, scheduler), the use cases built on it, port definitions,
//! and the immutable session configuration. It depends only on the domain
//! layer.

pub mod config;
pub mod execution;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{AdaptiveDefaults, AdmissionPolicy, SessionConfig, ToolCallPolicy};
pub use execution::{
    ApprovalGate, CallHandle, DiscoveryReport, GateVerdict, Registration, RegistryError,
    RegistryStats, Reservation, ResourceError, ResourceManager, ToolExecutionScheduler,
    ToolRegistry, TurnScope, discover_into,
};
pub use ports::{
    confirmation::{
        AutoApproveConfirmation, AutoDenyConfirmation, ConfirmationBroker, ConfirmationError,
        ConfirmationPort, ConfirmationRequest, PendingKey,
    },
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    escalation::{AbortOnEscalation, EscalationDecision, EscalationPort},
    evaluator::{ArgumentSuggester, SuggestionError, TaskEvaluator},
    execution_progress::{ExecutionProgressNotifier, NoExecutionProgress},
    model_gateway::{FragmentStream, GatewayError, ModelGateway},
    tool_handle::{ToolDescriptor, ToolHandle},
    tool_provider::{ProviderError, ToolProvider},
    tool_schema::ToolSchemaPort,
};
pub use use_cases::run_adaptive_task::{
    AdaptiveTaskError, AdaptiveTaskInput, RunAdaptiveTaskUseCase, TaskOutput,
};
pub use use_cases::run_turn::{RunTurnError, RunTurnUseCase, TurnOutput};
