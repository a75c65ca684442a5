//! Tool provider port
//!
//! A [`ToolProvider`] is a discovery source: it produces descriptors that
//! are pushed into the [`ToolRegistry`](crate::execution::registry::ToolRegistry)
//! through its ordinary `register` operation.
//!
//! ```text
//!    ┌──────────┐   ┌──────────┐   ┌──────────┐
//!    │ Function │   │ Command  │   │  Remote  │
//!    │ Provider │   │ Provider │   │ Provider │
//!    └────┬─────┘   └────┬─────┘   └────┬─────┘
//!         └──────────────┼──────────────┘
//!                        ▼  discover_into (descending priority)
//!                 ┌──────────────┐
//!                 │ ToolRegistry │
//!                 └──────────────┘
//! ```
//!
//! When two providers offer the same name, the higher priority wins and the
//! other descriptor is skipped.

use async_trait::async_trait;
use thiserror::Error;

use super::tool_handle::ToolDescriptor;

/// Error type for tool provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is not available (e.g., command not installed, server down)
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    /// Failed to discover tools from the provider
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Discovery source of tool descriptors
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Unique identifier for this provider (e.g., "builtin", "command", "remote:ops")
    fn id(&self) -> &str;

    /// Display name for user-facing output
    fn display_name(&self) -> &str {
        self.id()
    }

    /// Priority for name conflicts (higher = preferred)
    fn priority(&self) -> i32 {
        0
    }

    /// Check if the provider can currently supply tools
    async fn is_available(&self) -> bool;

    /// Discover the descriptors this provider offers
    async fn discover(&self) -> Result<Vec<ToolDescriptor>, ProviderError>;
}
