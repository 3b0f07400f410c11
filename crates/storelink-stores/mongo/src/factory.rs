use crate::{MongoConfig, MongoConnector};
use serde_json::Value;
use storelink_core::{ConnectorFactory, DynConnector, Error, Result, StoreKind};

pub struct MongoConnectorFactory;

impl ConnectorFactory for MongoConnectorFactory {
    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    fn name(&self) -> &str {
        "mongo"
    }

    fn create(&self, config: Value) -> Result<Box<dyn DynConnector>> {
        let config: MongoConfig = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("Invalid MongoDB config: {}", e)))?;
        Ok(Box::new(MongoConnector::new(config)))
    }
}
