//! Model boundary adapters

mod scripted;

pub use scripted::{ModelScript, ScriptError, ScriptedModelGateway};
