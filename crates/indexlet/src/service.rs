//! IndexService: transport-agnostic bridge lifecycle and dispatch.
//!
//! This service owns:
//! - The worker process and its connection, guarded by one lock (the
//!   exchange lock)
//! - The request/response exchange every operation goes through
//! - Shutdown coordination (signals and the explicit shutdown endpoint
//!   both land here)
//!
//! Transports hold an `Arc<IndexService>` and delegate operation calls
//! to it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};

use crate::bridge::protocol::{RequestId, WireRequest};
use crate::config::BridgeConfig;
use crate::connection::WorkerConnection;
use crate::error::{BridgeError, ErrorKind};
use crate::supervisor::{WorkerState, WorkerSupervisor};

/// Lifecycle stage of the bridge itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStage {
    /// Accepting operations
    #[default]
    Initialized,
    /// Shutdown in progress, operations rejected
    ShuttingDown,
    /// Connection closed and worker stopped
    ShutDown,
}

/// Snapshot of bridge state for transports to report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub stage: ServiceStage,
    pub worker: WorkerState,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_started_at: Option<DateTime<Utc>>,
}

/// Worker process and connection, guarded together.
///
/// Holding one lock over both for a whole ensure+write+read keeps
/// exchanges atomic and keeps a connection from outliving its worker
/// unnoticed.
struct BridgeState {
    supervisor: WorkerSupervisor,
    connection: Option<WorkerConnection>,
}

/// The service bridge: supervises the index worker and dispatches
/// operations to it.
///
/// Constructed once at startup and shared as `Arc<IndexService>`; there
/// is no process-global instance.
pub struct IndexService {
    config: BridgeConfig,
    bridge: Mutex<BridgeState>,
    stage: RwLock<ServiceStage>,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl IndexService {
    pub fn new(config: BridgeConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            bridge: Mutex::new(BridgeState {
                supervisor: WorkerSupervisor::new(),
                connection: None,
            }),
            stage: RwLock::new(ServiceStage::Initialized),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Dispatch one method call to the worker.
    ///
    /// Holds the exchange lock across ensure+write+read, so concurrent
    /// callers serialize rather than interleave on the shared stream.
    /// Worker and connection are established on demand; a call after a
    /// crash or a dropped connection recovers here before dispatching.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, BridgeError> {
        let mut bridge = self.bridge.lock().await;

        // Checked under the lock: shutdown may have stopped the worker
        // while this call was waiting.
        if *self.stage.read().await != ServiceStage::Initialized {
            return Err(BridgeError::connection("service is shutting down"));
        }

        self.ensure_connected(&mut bridge).await?;

        let request = WireRequest {
            id: RequestId::new(),
            method: method.to_string(),
            params,
        };
        let request_id = request.id;
        tracing::debug!(method, request_id = %request_id, "Dispatching to worker");

        let Some(conn) = bridge.connection.as_mut() else {
            return Err(BridgeError::connection("no worker connection"));
        };

        let response = match conn.exchange(request, self.config.exchange_timeout).await {
            Ok(response) => response,
            Err(e) => {
                // A dead stream stays invalidated until the next call
                // reconnects. Decode failures keep the connection; line
                // framing is still synchronized.
                if e.kind() == ErrorKind::Connection {
                    bridge.connection = None;
                }
                return Err(e);
            }
        };

        if let Some(id) = response.id.as_deref()
            && id != request_id.to_string()
        {
            // Desynchronized stream; whatever arrives next would also
            // belong to the wrong exchange.
            bridge.connection = None;
            return Err(BridgeError::decode(format!(
                "response id {id} does not match request id {request_id}"
            )));
        }

        if let Some(message) = response.error_text() {
            return Err(BridgeError::remote_service(message));
        }

        if let Some(message) = response.embedded_error() {
            return Err(BridgeError::remote_validation(message));
        }

        response
            .result
            .ok_or_else(|| BridgeError::decode("response carries neither result nor error"))
    }

    /// Make the bridge ready for an exchange, under the lock.
    ///
    /// A dead or never-started worker gets a fresh spawn plus the
    /// readiness probe; a running worker that lost its connection gets a
    /// single reconnect.
    async fn ensure_connected(&self, bridge: &mut BridgeState) -> Result<(), BridgeError> {
        let endpoint = self.config.endpoint();

        if !bridge.supervisor.is_alive() {
            bridge.connection = None;
            bridge.supervisor.spawn(&self.config)?;

            match WorkerConnection::connect_with_backoff(
                &endpoint,
                self.config.connect_timeout,
                self.config.ready_deadline,
            )
            .await
            {
                Ok(conn) => {
                    bridge.supervisor.mark_running();
                    bridge.connection = Some(conn);
                    tracing::info!(%endpoint, "Index worker ready");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Worker never became reachable, stopping it");
                    bridge.supervisor.stop(self.config.stop_grace).await;
                    return Err(e);
                }
            }
        } else if bridge.connection.is_none() {
            let conn = WorkerConnection::connect(&endpoint, self.config.connect_timeout).await?;
            tracing::debug!(%endpoint, "Reconnected to index worker");
            bridge.connection = Some(conn);
        }

        Ok(())
    }

    /// Stop the worker without shutting the service down.
    ///
    /// The next operation spawns a fresh worker and reconnects.
    pub async fn stop_worker(&self) {
        let mut bridge = self.bridge.lock().await;
        teardown(&mut bridge, &self.config).await;
    }

    /// Shut the bridge down: close the connection, then stop the worker.
    ///
    /// Runs at most once; repeated and concurrent calls beyond the first
    /// return immediately. Acquiring the exchange lock waits out any
    /// in-flight exchange instead of closing the stream under it.
    pub async fn shutdown(&self) {
        {
            let mut stage = self.stage.write().await;
            if *stage != ServiceStage::Initialized {
                return;
            }
            *stage = ServiceStage::ShuttingDown;
        }

        tracing::info!("Shutting down index bridge");
        let mut bridge = self.bridge.lock().await;
        teardown(&mut bridge, &self.config).await;
        drop(bridge);

        *self.stage.write().await = ServiceStage::ShutDown;
        tracing::info!("Index bridge shut down");
    }

    /// Snapshot of the current bridge state.
    ///
    /// Never waits on the exchange lock; while an exchange holds it the
    /// worker is by definition running and connected.
    pub async fn status(&self) -> ServiceStatus {
        let stage = *self.stage.read().await;
        match self.bridge.try_lock() {
            Ok(mut bridge) => {
                let alive = bridge.supervisor.is_alive();
                if !alive {
                    // Crash detection drops the stale connection with
                    // the handle.
                    bridge.connection = None;
                }
                ServiceStatus {
                    stage,
                    worker: bridge.supervisor.state(),
                    connected: alive && bridge.connection.is_some(),
                    worker_started_at: bridge.supervisor.started_at(),
                }
            }
            Err(_) => ServiceStatus {
                stage,
                worker: WorkerState::Running,
                connected: true,
                worker_started_at: None,
            },
        }
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}

/// Close the connection and stop the worker. Stopping proceeds even if
/// the close fails.
async fn teardown(bridge: &mut BridgeState, config: &BridgeConfig) {
    if let Some(conn) = bridge.connection.take() {
        conn.close().await;
    }
    bridge.supervisor.stop(config.stop_grace).await;
}
