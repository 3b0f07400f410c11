use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{Error, LifetimeScope, Result, Stage, StoreClient, StoreKind, Timeouts};

/// A verified-live client together with the lifetime scope it was opened in.
///
/// Only [`crate::ConnectionManager`] builds handles, and only after the
/// client's liveness probe succeeded. `close` consumes the handle.
pub struct ConnectionHandle<C: StoreClient> {
    client: C,
    scope: LifetimeScope,
    kind: StoreKind,
    timeouts: Timeouts,
    verified_at: DateTime<Utc>,
}

impl<C: StoreClient> ConnectionHandle<C> {
    pub(crate) fn new(client: C, scope: LifetimeScope, kind: StoreKind, timeouts: Timeouts) -> Self {
        Self {
            client,
            scope,
            kind,
            timeouts,
            verified_at: Utc::now(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// When the liveness probe that admitted this handle completed
    pub fn verified_at(&self) -> DateTime<Utc> {
        self.verified_at
    }

    /// Token cancelled once this handle is closed
    pub fn child_token(&self) -> CancellationToken {
        self.scope.child_token()
    }

    /// Re-run the liveness probe against the open client
    pub async fn ping(&self) -> Result<()> {
        self.scope
            .run(Stage::Probe, self.timeouts.probe(), self.client.ping())
            .await
    }

    /// Disconnect the client, then cancel the lifetime scope.
    ///
    /// The scope is cancelled whether or not the disconnect succeeded.
    pub async fn close(self) -> Result<()> {
        let ConnectionHandle {
            client,
            scope,
            kind,
            timeouts,
            ..
        } = self;

        info!("Closing {} connection to {}", kind, client.endpoint());

        let outcome = tokio::time::timeout(timeouts.teardown(), client.disconnect()).await;
        scope.cancel();

        match outcome {
            Ok(Ok(())) => {
                info!("Closed {} connection", kind);
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Failed to disconnect {}: {}", kind, e);
                match e {
                    Error::Teardown(_) => Err(e),
                    other => Err(Error::Teardown(other.to_string())),
                }
            }
            Err(_) => {
                warn!(
                    "Disconnecting {} did not finish within {:?}",
                    kind,
                    timeouts.teardown()
                );
                Err(Error::Timeout {
                    stage: Stage::Teardown,
                    after: timeouts.teardown(),
                })
            }
        }
    }
}

impl<C: StoreClient> std::fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("kind", &self.kind)
            .field("endpoint", &self.client.endpoint())
            .field("scope", &self.scope.id())
            .finish()
    }
}
