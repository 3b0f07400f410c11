use std::time::Duration;
use thiserror::Error;

use crate::Stage;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Liveness error: {0}")]
    Liveness(String),

    #[error("Teardown error: {0}")]
    Teardown(String),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("{0} cancelled")]
    Cancelled(Stage),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Lifecycle stage the error was raised in, when it maps to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Configuration(_) => Some(Stage::Configure),
            Error::Connect(_) => Some(Stage::Connect),
            Error::Resolution(_) => Some(Stage::Resolve),
            Error::Liveness(_) => Some(Stage::Probe),
            Error::Teardown(_) => Some(Stage::Teardown),
            Error::Timeout { stage, .. } | Error::Cancelled(stage) => Some(*stage),
            Error::Serialization(_) | Error::Generic(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            Error::Resolution("no host".to_string()).stage(),
            Some(Stage::Resolve)
        );
        let err = Error::Timeout {
            stage: Stage::Connect,
            after: Duration::from_secs(10),
        };
        assert!(err.is_timeout());
        assert_eq!(err.stage(), Some(Stage::Connect));
        assert_eq!(err.to_string(), "connect timed out after 10s");
    }
}
