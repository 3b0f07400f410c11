use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    ConnectionHandle, ConnectionState, Error, LifetimeScope, Registry, Result, Stage, StoreClient,
    StoreConfig, StoreConnector, StoreKind,
};

/// Handle to a client whose concrete type was resolved through the registry
pub type DynHandle = ConnectionHandle<Box<dyn StoreClient>>;

/// Result of one connect attempt in a batch
pub struct ConnectOutcome {
    pub kind: StoreKind,
    pub result: Result<DynHandle>,
}

impl ConnectOutcome {
    pub fn state(&self) -> ConnectionState {
        match &self.result {
            Ok(_) => ConnectionState::Connected,
            Err(e) => ConnectionState::Failed(e.to_string()),
        }
    }
}

/// Brings stores up through one uniform lifecycle:
/// connect (bounded), probe (bounded), hand over; or fail and release.
pub struct ConnectionManager {
    registry: Arc<Registry>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Connect through a typed connector.
    ///
    /// Creates exactly one lifetime scope for the attempt. The handle is only
    /// returned once the client's liveness probe succeeded; on any failure the
    /// scope is cancelled and the partially built client is disconnected.
    pub async fn connect<T: StoreConnector>(connector: &T) -> Result<ConnectionHandle<T::Client>> {
        let kind = connector.kind();
        let timeouts = connector.timeouts();
        let scope = LifetimeScope::new(kind.as_str());

        debug!("{} state: {:?}", kind, ConnectionState::Connecting);

        let client = match scope
            .run(Stage::Connect, timeouts.connect(), connector.connect(&scope))
            .await
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to connect {}: {}", kind, e);
                scope.cancel();
                return Err(e);
            }
        };

        let probe = async {
            client.ping().await.map_err(|e| match e {
                Error::Liveness(_) | Error::Timeout { .. } | Error::Cancelled(_) => e,
                other => Error::Liveness(other.to_string()),
            })
        };

        if let Err(e) = scope.run(Stage::Probe, timeouts.probe(), probe).await {
            warn!(
                "Liveness probe for {} at {} failed: {}",
                kind,
                client.endpoint(),
                e
            );
            match tokio::time::timeout(timeouts.teardown(), client.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(te)) => debug!("Discarding {} client after failed probe: {}", kind, te),
                Err(_) => debug!("Discarding {} client after failed probe timed out", kind),
            }
            scope.cancel();
            return Err(e);
        }

        info!("✅ {} client ready ({})", kind, client.endpoint());
        Ok(ConnectionHandle::new(client, scope, kind, timeouts))
    }

    /// Resolve `config` through the registry and connect
    pub async fn connect_config(&self, config: &StoreConfig) -> Result<DynHandle> {
        let factory = self.registry.get_factory(config.kind)?;
        let connector = factory.create(config.config.clone())?;
        Self::connect(&connector).await
    }

    /// Connect several stores concurrently; each attempt is independent
    pub async fn connect_all(&self, configs: &[StoreConfig]) -> Vec<ConnectOutcome> {
        let attempts = configs.iter().map(|config| async move {
            ConnectOutcome {
                kind: config.kind,
                result: self.connect_config(config).await,
            }
        });
        join_all(attempts).await
    }

    /// Release a handle: disconnect, then cancel its scope
    pub async fn close<C: StoreClient>(handle: ConnectionHandle<C>) -> Result<()> {
        handle.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{async_trait, ConnectorFactory, DynConnector, Timeouts};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Calls {
        pings: AtomicUsize,
        disconnects: AtomicUsize,
        cancelled_during_disconnect: AtomicBool,
        tokens: Mutex<Vec<CancellationToken>>,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Healthy,
        RefuseConnect,
        HangConnect,
        FailPing,
        FailDisconnect,
        HangDisconnect,
    }

    struct FakeConnector {
        behavior: Behavior,
        calls: Arc<Calls>,
        next_id: Arc<AtomicUsize>,
    }

    impl FakeConnector {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Arc::new(Calls::default()),
                next_id: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct FakeClient {
        id: usize,
        behavior: Behavior,
        calls: Arc<Calls>,
        token: CancellationToken,
    }

    #[async_trait]
    impl StoreClient for FakeClient {
        fn kind(&self) -> StoreKind {
            StoreKind::Cache
        }

        fn endpoint(&self) -> String {
            format!("fake-{}", self.id)
        }

        async fn ping(&self) -> Result<()> {
            self.calls.pings.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::FailPing => Err(Error::Connect("connection reset".to_string())),
                _ => Ok(()),
            }
        }

        async fn disconnect(&self) -> Result<()> {
            self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
            self.calls
                .cancelled_during_disconnect
                .store(self.token.is_cancelled(), Ordering::SeqCst);
            match self.behavior {
                Behavior::FailDisconnect => Err(Error::Connect("socket closed".to_string())),
                Behavior::HangDisconnect => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl StoreConnector for FakeConnector {
        type Client = FakeClient;

        fn kind(&self) -> StoreKind {
            StoreKind::Cache
        }

        fn timeouts(&self) -> Timeouts {
            Timeouts::cache()
        }

        async fn connect(&self, scope: &LifetimeScope) -> Result<FakeClient> {
            let token = scope.child_token();
            self.calls.tokens.lock().unwrap().push(token.clone());
            match self.behavior {
                Behavior::RefuseConnect => Err(Error::Connect("connection refused".to_string())),
                Behavior::HangConnect => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("connect should have timed out")
                }
                behavior => Ok(FakeClient {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    behavior,
                    calls: self.calls.clone(),
                    token,
                }),
            }
        }
    }

    struct FakeFactory;

    impl ConnectorFactory for FakeFactory {
        fn kind(&self) -> StoreKind {
            StoreKind::Cache
        }

        fn name(&self) -> &str {
            "fake"
        }

        fn create(&self, _config: Value) -> Result<Box<dyn DynConnector>> {
            Ok(Box::new(FakeConnector::new(Behavior::Healthy)))
        }
    }

    #[tokio::test]
    async fn test_connect_verifies_liveness_before_returning() {
        let connector = FakeConnector::new(Behavior::Healthy);
        let handle = ConnectionManager::connect(&connector).await.unwrap();

        assert_eq!(connector.calls.pings.load(Ordering::SeqCst), 1);
        assert_eq!(handle.kind(), StoreKind::Cache);
        assert!(!handle.child_token().is_cancelled());

        ConnectionManager::close(handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_ping_returns_no_handle_and_releases_scope() {
        let connector = FakeConnector::new(Behavior::FailPing);
        let err = ConnectionManager::connect(&connector).await.unwrap_err();

        assert!(matches!(err, Error::Liveness(_)));
        assert_eq!(connector.calls.disconnects.load(Ordering::SeqCst), 1);
        let tokens = connector.calls.tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_cancelled());
    }

    #[tokio::test]
    async fn test_connect_error_skips_ping() {
        let connector = FakeConnector::new(Behavior::RefuseConnect);
        let err = ConnectionManager::connect(&connector).await.unwrap_err();

        assert!(matches!(err, Error::Connect(_)));
        assert_eq!(connector.calls.pings.load(Ordering::SeqCst), 0);
        assert!(connector.calls.tokens.lock().unwrap()[0].is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_connect_is_bounded() {
        let connector = FakeConnector::new(Behavior::HangConnect);
        let started = tokio::time::Instant::now();
        let err = ConnectionManager::connect(&connector).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.stage(), Some(Stage::Connect));
        assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(1));
        assert!(connector.calls.tokens.lock().unwrap()[0].is_cancelled());
    }

    #[tokio::test]
    async fn test_close_disconnects_before_cancelling_scope() {
        let connector = FakeConnector::new(Behavior::Healthy);
        let handle = ConnectionManager::connect(&connector).await.unwrap();
        let token = handle.child_token();

        handle.close().await.unwrap();

        assert_eq!(connector.calls.disconnects.load(Ordering::SeqCst), 1);
        assert!(!connector
            .calls
            .cancelled_during_disconnect
            .load(Ordering::SeqCst));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_close_reports_teardown_failure_and_still_cancels() {
        let connector = FakeConnector::new(Behavior::FailDisconnect);
        let handle = ConnectionManager::connect(&connector).await.unwrap();
        let token = handle.child_token();

        let err = handle.close().await.unwrap_err();

        assert!(matches!(err, Error::Teardown(_)));
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_bounds_hanging_disconnect_and_still_cancels() {
        let connector = FakeConnector::new(Behavior::HangDisconnect);
        let handle = ConnectionManager::connect(&connector).await.unwrap();
        let token = handle.child_token();
        let started = tokio::time::Instant::now();

        let err = handle.close().await.unwrap_err();

        assert!(matches!(
            err,
            Error::Timeout {
                stage: Stage::Teardown,
                ..
            }
        ));
        assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(1));
        assert_eq!(connector.calls.disconnects.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_concurrent_connects_are_independent() {
        let connector = FakeConnector::new(Behavior::Healthy);
        let (a, b) = tokio::join!(
            ConnectionManager::connect(&connector),
            ConnectionManager::connect(&connector)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.client().id, b.client().id);

        a.close().await.unwrap();
        assert!(!b.child_token().is_cancelled());
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_config_uses_registry() {
        let mut registry = Registry::new();
        registry.register(Arc::new(FakeFactory));
        let manager = ConnectionManager::new(Arc::new(registry));

        let handle = manager
            .connect_config(&StoreConfig::new(StoreKind::Cache, Value::Null))
            .await
            .unwrap();
        assert_eq!(handle.client().endpoint(), "fake-0");
        ConnectionManager::close(handle).await.unwrap();

        let outcomes = manager
            .connect_all(&[StoreConfig::new(StoreKind::Document, Value::Null)])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].state(), ConnectionState::Failed(_)));
        assert!(matches!(outcomes[0].result, Err(Error::Configuration(_))));
    }
}
