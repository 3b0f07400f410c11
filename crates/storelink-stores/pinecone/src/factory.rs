use crate::{PineconeConfig, PineconeConnector};
use serde_json::Value;
use storelink_core::{ConnectorFactory, DynConnector, Error, Result, StoreKind};

pub struct PineconeConnectorFactory;

impl ConnectorFactory for PineconeConnectorFactory {
    fn kind(&self) -> StoreKind {
        StoreKind::VectorIndex
    }

    fn name(&self) -> &str {
        "pinecone"
    }

    fn create(&self, config: Value) -> Result<Box<dyn DynConnector>> {
        let config: PineconeConfig = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("Invalid Pinecone config: {}", e)))?;
        Ok(Box::new(PineconeConnector::new(config)))
    }
}
