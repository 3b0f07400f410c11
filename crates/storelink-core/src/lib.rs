mod error;
mod factory;
mod handle;
mod kind;
mod manager;
mod registry;
mod scope;
mod store;
mod timeouts;

pub use error::{Error, Result};
pub use factory::{ConnectorFactory, StoreConfig};
pub use handle::ConnectionHandle;
pub use kind::{ConnectionState, Stage, StoreKind};
pub use manager::{ConnectOutcome, ConnectionManager, DynHandle};
pub use registry::Registry;
pub use scope::LifetimeScope;
pub use store::{DynConnector, StoreClient, StoreConnector};
pub use timeouts::Timeouts;

// Re-export for connector crates
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
