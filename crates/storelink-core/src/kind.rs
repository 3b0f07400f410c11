use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// External store families the manager knows how to bring up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Document,
    VectorIndex,
    Cache,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [StoreKind::Document, StoreKind::VectorIndex, StoreKind::Cache];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Document => "document",
            StoreKind::VectorIndex => "vector_index",
            StoreKind::Cache => "cache",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" | "mongo" | "mongodb" => Ok(StoreKind::Document),
            "vector_index" | "vector-index" | "pinecone" => Ok(StoreKind::VectorIndex),
            "cache" | "redis" => Ok(StoreKind::Cache),
            other => Err(Error::Configuration(format!("Unknown store kind '{}'", other))),
        }
    }
}

/// Steps of a single connect/close cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configure,
    Connect,
    Resolve,
    Probe,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Connect => "connect",
            Stage::Resolve => "resolve",
            Stage::Probe => "probe",
            Stage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Connection lifecycle. `Failed` is terminal for an attempt; only `close`
/// leads back to `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}
