use crate::{ConnectorFactory, Error, Result, StoreKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of connector factories, one per store kind
pub struct Registry {
    factories: HashMap<StoreKind, Arc<dyn ConnectorFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory, replacing any earlier one for the same kind
    pub fn register(&mut self, factory: Arc<dyn ConnectorFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    /// Get the factory for a store kind
    pub fn get_factory(&self, kind: StoreKind) -> Result<Arc<dyn ConnectorFactory>> {
        self.factories
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("No connector registered for '{}'", kind)))
    }

    /// List registered store kinds with their backend names
    pub fn list(&self) -> Vec<(StoreKind, String)> {
        let mut entries: Vec<_> = self
            .factories
            .iter()
            .map(|(kind, factory)| (*kind, factory.name().to_string()))
            .collect();
        entries.sort_by_key(|(kind, _)| kind.as_str());
        entries
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
