//! Bridge configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::supervisor::{IndexWorkerSpawner, WorkerSpawner};

/// Configuration for the worker bridge.
///
/// Defaults match the conventional worker layout: the `IndexStoreService`
/// executable inside a Swift build-output directory, listening on
/// 127.0.0.1:7949.
#[derive(Clone)]
pub struct BridgeConfig {
    /// Worker executable name, resolved inside `worker_dir` unless absolute.
    pub worker_bin: String,
    /// Build-output directory: the worker's working directory, also
    /// prepended to its `PATH`.
    pub worker_dir: PathBuf,
    /// Host the worker listens on.
    pub worker_host: String,
    /// Port the worker listens on.
    pub worker_port: u16,
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
    /// Overall deadline for the post-spawn readiness probe.
    pub ready_deadline: Duration,
    /// Timeout for reading one response line.
    pub exchange_timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL when stopping the worker.
    pub stop_grace: Duration,
    pub spawner: Arc<dyn WorkerSpawner>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_bin: "IndexStoreService".to_string(),
            worker_dir: PathBuf::from("swift-service/.build/debug"),
            worker_host: "127.0.0.1".to_string(),
            worker_port: 7949,
            connect_timeout: Duration::from_secs(2),
            ready_deadline: Duration::from_secs(10),
            exchange_timeout: Duration::from_secs(30),
            stop_grace: Duration::from_secs(2),
            spawner: Arc::new(IndexWorkerSpawner),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_bin(mut self, bin: impl Into<String>) -> Self {
        self.worker_bin = bin.into();
        self
    }

    pub fn with_worker_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.worker_dir = dir.into();
        self
    }

    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.worker_host = host.into();
        self.worker_port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ready_deadline(mut self, deadline: Duration) -> Self {
        self.ready_deadline = deadline;
        self
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn WorkerSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Worker endpoint in `host:port` form.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.worker_host, self.worker_port)
    }
}
