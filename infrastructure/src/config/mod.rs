//! Configuration file loading for tool-relay
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `RELAY_*` environment variables (`RELAY_TURN__MAX_DEPTH=4`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./relay.toml` or `./.relay.toml`
//! 4. Global: `$XDG_CONFIG_HOME/tool-relay/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileAdaptiveConfig, FileApprovalConfig, FileCommandToolConfig,
    FileCommandToolParameter, FileConfig, FileExecutionConfig, FileLoggingConfig,
    FileQuotasConfig, FileToolsConfig, FileTurnConfig,
};
pub use loader::{ConfigLoader, ConfigSource, SourceKind};
