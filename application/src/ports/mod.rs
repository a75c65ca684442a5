//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod confirmation;
pub mod conversation_logger;
pub mod escalation;
pub mod evaluator;
pub mod execution_progress;
pub mod model_gateway;
pub mod tool_handle;
pub mod tool_provider;
pub mod tool_schema;
