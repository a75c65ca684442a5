//! Resource quota types.
//!
//! Quotas are configured externally; the application layer's resource
//! manager only enforces them.

use serde::{Deserialize, Serialize};

/// A kind of capacity tracked by the resource manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Number of tool calls in `Executing` at once
    ConcurrentExecutions,
    /// Memory budget declared by executing tools
    MemoryBytes,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConcurrentExecutions => "concurrent_executions",
            ResourceKind::MemoryBytes => "memory_bytes",
        }
    }

    pub fn all() -> &'static [ResourceKind] {
        &[ResourceKind::ConcurrentExecutions, ResourceKind::MemoryBytes]
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quota limits. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub max_concurrent_executions: Option<u64>,
    pub max_memory_bytes: Option<u64>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: Some(10),
            max_memory_bytes: Some(512 * 1024 * 1024),
        }
    }
}

impl QuotaConfig {
    pub fn unlimited() -> Self {
        Self {
            max_concurrent_executions: None,
            max_memory_bytes: None,
        }
    }

    pub fn with_max_concurrent(mut self, limit: u64) -> Self {
        self.max_concurrent_executions = Some(limit);
        self
    }

    pub fn with_max_memory_bytes(mut self, limit: u64) -> Self {
        self.max_memory_bytes = Some(limit);
        self
    }

    pub fn limit(&self, kind: ResourceKind) -> Option<u64> {
        match kind {
            ResourceKind::ConcurrentExecutions => self.max_concurrent_executions,
            ResourceKind::MemoryBytes => self.max_memory_bytes,
        }
    }
}

/// Point-in-time view of one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub kind: ResourceKind,
    pub limit: Option<u64>,
    pub in_use: u64,
    /// Requests queued behind the quota
    pub waiting: usize,
    /// Holders of live reservations (call ids)
    pub holders: Vec<String>,
    pub grants: u64,
    pub releases: u64,
}

impl ResourceUsage {
    pub fn available(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.in_use))
    }
}
