use crate::{LifetimeScope, Result, StoreKind, Timeouts};
use async_trait::async_trait;

/// A live client for one external store
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Which store family this client talks to
    fn kind(&self) -> StoreKind;

    /// Human-readable endpoint, used in logs. Must not include secrets.
    fn endpoint(&self) -> String;

    /// Lightweight round-trip confirming the store answers
    async fn ping(&self) -> Result<()>;

    /// Release the underlying client
    async fn disconnect(&self) -> Result<()>;
}

/// Builds a client for one store from its resolved configuration
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Client: StoreClient;

    fn kind(&self) -> StoreKind;

    fn timeouts(&self) -> Timeouts;

    /// Construct the client. Multi-step connectors run each step through
    /// `scope` so they can be timed out and cancelled individually.
    async fn connect(&self, scope: &LifetimeScope) -> Result<Self::Client>;
}

/// Object-safe form of [`StoreConnector`], produced by factories
#[async_trait]
pub trait DynConnector: Send + Sync {
    fn kind(&self) -> StoreKind;

    fn timeouts(&self) -> Timeouts;

    async fn connect_boxed(&self, scope: &LifetimeScope) -> Result<Box<dyn StoreClient>>;
}

#[async_trait]
impl<T: StoreConnector> DynConnector for T {
    fn kind(&self) -> StoreKind {
        StoreConnector::kind(self)
    }

    fn timeouts(&self) -> Timeouts {
        StoreConnector::timeouts(self)
    }

    async fn connect_boxed(&self, scope: &LifetimeScope) -> Result<Box<dyn StoreClient>> {
        let client = self.connect(scope).await?;
        Ok(Box::new(client))
    }
}

#[async_trait]
impl StoreConnector for Box<dyn DynConnector> {
    type Client = Box<dyn StoreClient>;

    fn kind(&self) -> StoreKind {
        (**self).kind()
    }

    fn timeouts(&self) -> Timeouts {
        (**self).timeouts()
    }

    async fn connect(&self, scope: &LifetimeScope) -> Result<Self::Client> {
        (**self).connect_boxed(scope).await
    }
}

#[async_trait]
impl StoreClient for Box<dyn StoreClient> {
    fn kind(&self) -> StoreKind {
        (**self).kind()
    }

    fn endpoint(&self) -> String {
        (**self).endpoint()
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }
}
