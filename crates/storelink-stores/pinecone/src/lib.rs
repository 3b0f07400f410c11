mod factory;
mod pinecone_store;

pub use factory::PineconeConnectorFactory;
pub use pinecone_store::{
    IndexDescription, IndexStats, IndexStatus, NamespaceStats, PineconeConfig, PineconeConnector,
    PineconeStore,
};
