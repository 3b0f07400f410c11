use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds applied to each blocking step of a store's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Dial / client construction bound, in milliseconds
    pub connect_timeout_ms: u64,

    /// Bound on waiting for a response
    pub read_timeout_ms: u64,

    /// Bound on sending a request (or checking out a connection to send on)
    pub write_timeout_ms: u64,

    /// Bound on the post-connect liveness probe
    pub probe_timeout_ms: u64,

    /// Bound on disconnecting during close
    pub teardown_timeout_ms: u64,
}

impl Timeouts {
    /// Document store: a single 10s bound on everything but teardown
    pub fn document() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            read_timeout_ms: 10_000,
            write_timeout_ms: 10_000,
            probe_timeout_ms: 10_000,
            teardown_timeout_ms: 5_000,
        }
    }

    pub fn vector_index() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            read_timeout_ms: 10_000,
            write_timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
            teardown_timeout_ms: 5_000,
        }
    }

    /// Cache: 5s dial, 3s read/write, 5s ping
    pub fn cache() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            read_timeout_ms: 3_000,
            write_timeout_ms: 3_000,
            probe_timeout_ms: 5_000,
            teardown_timeout_ms: 5_000,
        }
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn teardown(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::document()
    }
}
