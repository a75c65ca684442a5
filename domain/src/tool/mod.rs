//! Tool domain module
//!
//! Every tool is described by a [`ToolDefinition`] (name, version, typed
//! parameters, risk level, category) and invoked through a [`ToolCall`].
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌─────────────────────┐
//! │ ToolSpec     │───▶│ ToolCall     │───▶│ ToolCallOutcome     │
//! │ (snapshot)   │    │ (invocation) │    │ (payload | failure) │
//! └──────────────┘    └──────────────┘    └─────────────────────┘
//! ```
//!
//! # Risk and category
//!
//! | Risk | Category | Default mode | PlanOnly |
//! |------|----------|--------------|----------|
//! | Low  | Read     | approve      | approve  |
//! | Low  | Edit     | approve      | deny     |
//! | High | Execute  | confirm      | deny     |
//!
//! The invocation handle lives in the application layer; this module stays
//! free of I/O.

pub mod entities;
pub mod traits;
pub mod value_objects;

pub use entities::{
    RiskLevel, ToolCall, ToolCategory, ToolDefinition, ToolInclusion, ToolParameter, ToolSpec,
};
pub use traits::{DefaultToolValidator, ToolValidator};
pub use value_objects::ToolError;
