use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result, Stage};

/// Cancellable lifetime bound to one connect attempt and, on success, to the
/// handle produced by it.
///
/// Every blocking step of the attempt runs through [`LifetimeScope::run`],
/// which races the step against both its own deadline and the scope's
/// cancellation. Dropping the scope cancels it, so an abandoned attempt never
/// leaves a live token behind.
#[derive(Debug)]
pub struct LifetimeScope {
    id: Uuid,
    label: String,
    token: CancellationToken,
}

impl LifetimeScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Token for work that should stop when this scope is cancelled
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Cancelling lifetime scope '{}' ({})", self.label, self.id);
            self.token.cancel();
        }
    }

    /// Run one stage, bounded by `limit` and by this scope's cancellation.
    pub async fn run<F, T>(&self, stage: Stage, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled(stage)),
            res = tokio::time::timeout(limit, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(Error::Timeout { stage, after: limit }),
            },
        }
    }
}

impl Drop for LifetimeScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
