use crate::{DynConnector, Result, StoreKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Factory trait for creating store connectors
pub trait ConnectorFactory: Send + Sync {
    /// Store family this factory builds connectors for
    fn kind(&self) -> StoreKind;

    /// Backend identifier (e.g., "mongo", "redis")
    fn name(&self) -> &str;

    /// Create a new connector from backend-specific configuration
    fn create(&self, config: Value) -> Result<Box<dyn DynConnector>>;
}

/// A store kind paired with its backend-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Backend-specific configuration, resolved by the kind's factory
    pub config: Value,
}

impl StoreConfig {
    pub fn new(kind: StoreKind, config: Value) -> Self {
        Self { kind, config }
    }
}
