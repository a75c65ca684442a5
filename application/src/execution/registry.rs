//! Tool Registry
//!
//! Holds validated [`ToolDescriptor`]s keyed by name. Registration is the
//! only mutation; lookups and listings never mutate and return snapshots.
//!
//! # Re-registration
//!
//! | Existing entry | `register` | `register_replacing` |
//! |----------------|------------|----------------------|
//! | none | inserted | inserted |
//! | same version | no-op | replaced |
//! | other version | `DuplicateName` | replaced |
//!
//! Discovery sources push descriptors through the same interface via
//! [`discover_into`], which walks providers in descending priority.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;
use relay_domain::{ToolDefinition, ToolInclusion, ToolSpec};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::ports::tool_handle::ToolDescriptor;
use crate::ports::tool_provider::ToolProvider;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{name}' already registered with version {existing} (attempted {attempted})")]
    DuplicateName {
        name: String,
        existing: String,
        attempted: String,
    },

    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Result of a successful `register`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// Same name and version already present; nothing changed
    Unchanged,
    Replaced,
}

#[derive(Default)]
struct RegistryInner {
    descriptors: HashMap<String, ToolDescriptor>,
    order: Vec<String>,
}

/// Name-keyed registry of tool descriptors.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Fails with `DuplicateName` if a differently-versioned descriptor of
    /// the same name exists.
    pub fn register(&self, descriptor: ToolDescriptor) -> Result<Registration, RegistryError> {
        self.insert(descriptor, false)
    }

    /// Register a descriptor, replacing any existing one of the same name.
    pub fn register_replacing(&self, descriptor: ToolDescriptor) -> Registration {
        // Replacing never conflicts
        self.insert(descriptor, true)
            .unwrap_or(Registration::Replaced)
    }

    fn insert(&self, descriptor: ToolDescriptor, replace: bool) -> Result<Registration, RegistryError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = descriptor.name().to_string();

        let outcome = match inner.descriptors.get(&name) {
            None => Registration::Inserted,
            Some(existing) if replace => {
                debug!(tool = %name, from = existing.version(), to = descriptor.version(), "Replacing tool");
                Registration::Replaced
            }
            Some(existing) if existing.version() == descriptor.version() => {
                trace!(tool = %name, version = existing.version(), "Tool already registered");
                return Ok(Registration::Unchanged);
            }
            Some(existing) => {
                return Err(RegistryError::DuplicateName {
                    name,
                    existing: existing.version().to_string(),
                    attempted: descriptor.version().to_string(),
                });
            }
        };

        if outcome == Registration::Inserted {
            inner.order.push(name.clone());
            debug!(tool = %name, version = descriptor.version(), source = %descriptor.source, "Registered tool");
        }
        inner.descriptors.insert(name, descriptor);
        Ok(outcome)
    }

    /// Remove a tool. Returns the removed descriptor.
    pub fn deregister(&self, name: &str) -> Result<ToolDescriptor, RegistryError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = inner
            .descriptors
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        inner.order.retain(|n| n != name);
        debug!(tool = name, "Deregistered tool");
        Ok(removed)
    }

    pub fn lookup(&self, name: &str) -> Result<ToolDescriptor, RegistryError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .descriptors
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .descriptors
            .contains_key(name)
    }

    /// Snapshot of all descriptors in insertion order
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|name| inner.descriptors.get(name).cloned())
            .collect()
    }

    /// Snapshot of the definitions as a [`ToolSpec`]
    pub fn spec(&self) -> ToolSpec {
        self.list()
            .into_iter()
            .fold(ToolSpec::new(), |spec, d| spec.register(d.definition))
    }

    /// Definitions admitted by an inclusion policy, in insertion order
    pub fn definitions(&self, inclusion: &ToolInclusion) -> Vec<ToolDefinition> {
        self.spec().select(inclusion)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get statistics about registered tools
    pub fn stats(&self) -> RegistryStats {
        let mut tools_per_source = BTreeMap::new();
        for descriptor in self.list() {
            *tools_per_source.entry(descriptor.source).or_insert(0) += 1;
        }
        RegistryStats {
            total_tools: tools_per_source.values().sum(),
            tools_per_source,
        }
    }
}

/// Statistics about the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_tools: usize,
    pub tools_per_source: BTreeMap<String, usize>,
}

/// What a discovery pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    /// Names already taken by a higher-priority source
    pub skipped: Vec<String>,
    /// Provider ids that were unavailable or failed
    pub failed_sources: Vec<String>,
}

/// Push every available provider's descriptors into `registry`.
///
/// Providers are visited in descending priority; a name already present
/// (from an earlier, higher-priority provider or a prior registration) is
/// skipped, never an error.
pub async fn discover_into(
    registry: &ToolRegistry,
    providers: &[Arc<dyn ToolProvider>],
) -> DiscoveryReport {
    let mut ordered: Vec<&Arc<dyn ToolProvider>> = providers.iter().collect();
    ordered.sort_by_key(|p| std::cmp::Reverse(p.priority()));

    // Probe and discover concurrently; merge strictly in priority order
    let results = join_all(ordered.iter().map(|provider| async move {
        if !provider.is_available().await {
            return None;
        }
        Some(provider.discover().await)
    }))
    .await;

    let mut report = DiscoveryReport::default();
    for (provider, result) in ordered.into_iter().zip(results) {
        let descriptors = match result {
            None => {
                debug!(provider = provider.id(), "Provider not available, skipping");
                report.failed_sources.push(provider.id().to_string());
                continue;
            }
            Some(Ok(descriptors)) => descriptors,
            Some(Err(e)) => {
                warn!(provider = provider.id(), error = %e, "Failed to discover tools from provider");
                report.failed_sources.push(provider.id().to_string());
                continue;
            }
        };

        for descriptor in descriptors {
            let name = descriptor.name().to_string();
            if registry.contains(&name) {
                trace!(tool = %name, provider = provider.id(), "Tool already registered by higher priority source");
                report.skipped.push(name);
                continue;
            }
            match registry.register(descriptor.with_source(provider.id())) {
                Ok(_) => report.registered.push(name),
                Err(e) => {
                    warn!(tool = %name, provider = provider.id(), error = %e, "Registration failed");
                    report.skipped.push(name);
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::tool_provider::ProviderError;
    use crate::testing::{descriptor, echo_tool};
    use async_trait::async_trait;
    use relay_domain::{RiskLevel, ToolCategory};

    fn echo(name: &str, version: &str) -> ToolDescriptor {
        let mut d = descriptor(name, RiskLevel::Low, ToolCategory::Read, echo_tool());
        d.definition.version = version.to_string();
        d
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.register(echo("a", "1")).unwrap(), Registration::Inserted);
        assert_eq!(registry.lookup("a").unwrap().version(), "1");
        assert!(matches!(
            registry.lookup("missing"),
            Err(RegistryError::NotFound(n)) if n == "missing"
        ));
    }

    #[test]
    fn test_same_version_is_noop() {
        let registry = ToolRegistry::new();
        registry.register(echo("a", "1")).unwrap();
        assert_eq!(registry.register(echo("a", "1")).unwrap(), Registration::Unchanged);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_other_version_requires_replace() {
        let registry = ToolRegistry::new();
        registry.register(echo("a", "1")).unwrap();
        let err = registry.register(echo("a", "2")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateName {
                name: "a".into(),
                existing: "1".into(),
                attempted: "2".into()
            }
        );

        assert_eq!(registry.register_replacing(echo("a", "2")), Registration::Replaced);
        assert_eq!(registry.lookup("a").unwrap().version(), "2");
    }

    #[test]
    fn test_list_is_insertion_ordered_snapshot() {
        let registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(echo(name, "1")).unwrap();
        }
        let snapshot = registry.list();
        registry.register(echo("late", "1")).unwrap();

        let names: Vec<_> = snapshot.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.list().len(), 4);
        // Replacement keeps position
        registry.register_replacing(echo("zeta", "2"));
        assert_eq!(registry.list()[0].version(), "2");
    }

    #[test]
    fn test_deregister() {
        let registry = ToolRegistry::new();
        registry.register(echo("a", "1")).unwrap();
        registry.register(echo("b", "1")).unwrap();
        registry.deregister("a").unwrap();
        assert!(!registry.contains("a"));
        assert_eq!(registry.spec().names().collect::<Vec<_>>(), vec!["b"]);
        assert!(registry.deregister("a").is_err());
    }

    #[test]
    fn test_definitions_apply_inclusion() {
        let registry = ToolRegistry::new();
        registry.register(echo("read", "1")).unwrap();
        registry
            .register(descriptor("write", RiskLevel::Low, ToolCategory::Edit, echo_tool()))
            .unwrap();
        let read_only = registry.definitions(&ToolInclusion::ReadOnly);
        assert_eq!(read_only.len(), 1);
        assert_eq!(read_only[0].name, "read");
    }

    struct MockProvider {
        id: &'static str,
        priority: i32,
        available: bool,
        tools: Vec<&'static str>,
    }

    #[async_trait]
    impl ToolProvider for MockProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn discover(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
            if self.tools.is_empty() {
                return Err(ProviderError::DiscoveryFailed("no tools".into()));
            }
            Ok(self.tools.iter().map(|t| echo(t, self.id)).collect())
        }
    }

    #[tokio::test]
    async fn test_discover_into_prefers_higher_priority() {
        let registry = ToolRegistry::new();
        let providers: Vec<Arc<dyn ToolProvider>> = vec![
            Arc::new(MockProvider {
                id: "low",
                priority: -100,
                available: true,
                tools: vec!["probe", "echo"],
            }),
            Arc::new(MockProvider {
                id: "high",
                priority: 100,
                available: true,
                tools: vec!["probe"],
            }),
            Arc::new(MockProvider {
                id: "offline",
                priority: 50,
                available: false,
                tools: vec!["probe"],
            }),
            Arc::new(MockProvider {
                id: "broken",
                priority: 10,
                available: true,
                tools: vec![],
            }),
        ];

        let report = discover_into(&registry, &providers).await;

        assert_eq!(registry.lookup("probe").unwrap().source, "high");
        assert_eq!(registry.lookup("echo").unwrap().source, "low");
        assert_eq!(report.registered, vec!["probe", "echo"]);
        assert_eq!(report.skipped, vec!["probe"]);
        assert_eq!(report.failed_sources, vec!["offline", "broken"]);

        let stats = registry.stats();
        assert_eq!(stats.total_tools, 2);
        assert_eq!(stats.tools_per_source["high"], 1);
        assert_eq!(stats.tools_per_source["low"], 1);
    }
}
