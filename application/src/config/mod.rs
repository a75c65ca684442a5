//! Application configuration

pub mod session_config;

pub use session_config::{AdaptiveDefaults, AdmissionPolicy, SessionConfig, ToolCallPolicy};
