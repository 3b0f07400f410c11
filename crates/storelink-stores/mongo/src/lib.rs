mod factory;
mod mongo_store;

pub use factory::MongoConnectorFactory;
pub use mongo_store::{MongoConfig, MongoConnector, MongoStore, DEFAULT_DATABASE};
