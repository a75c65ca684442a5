//! Logging configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
///
/// # Example
///
/// ```toml
/// [logging]
/// level = "info"                               # EnvFilter directive when -v is not given
/// file = "~/.local/state/tool-relay/relay.log" # diagnostic log file
/// conversation_log = "transcripts/session.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Default filter directive (e.g. "info", "relay_application=debug")
    pub level: Option<String>,
    /// Diagnostic log file (in addition to stderr)
    pub file: Option<PathBuf>,
    /// JSONL transcript of model invocations, tool calls and verdicts
    pub conversation_log: Option<PathBuf>,
}
