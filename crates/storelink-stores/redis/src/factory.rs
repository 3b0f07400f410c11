use crate::{RedisConfig, RedisConnector};
use storelink_core::{ConnectorFactory, DynConnector, Result, StoreKind};
use serde_json::Value;

pub struct RedisConnectorFactory;

impl ConnectorFactory for RedisConnectorFactory {
    fn kind(&self) -> StoreKind {
        StoreKind::Cache
    }

    fn name(&self) -> &str {
        "redis"
    }

    fn create(&self, config: Value) -> Result<Box<dyn DynConnector>> {
        // Every cache setting has a default, so a bare entry is valid
        let config: RedisConfig = if config.is_null() {
            RedisConfig::default()
        } else {
            serde_json::from_value(config)?
        };
        Ok(Box::new(RedisConnector::new(config)))
    }
}
