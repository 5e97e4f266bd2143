//! Worker process supervision.
//!
//! Spawns the index-store worker in its own process group and owns its
//! lifecycle: liveness checks between exchanges, SIGTERM to the group on
//! stop, SIGKILL after the grace period, and reaping so no zombie survives.
//! The new process group keeps signals sent to the bridge from reaching the
//! worker, so teardown stays ordered.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Lifecycle state of the worker process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    /// Never spawned
    #[default]
    NotStarted,
    /// Spawned, readiness probe not yet passed
    Starting,
    /// Spawned and reachable
    Running,
    /// Stop in progress
    Terminating,
    /// Exited or stopped
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Terminating => "TERMINATING",
            Self::Stopped => "STOPPED",
        }
    }
}

/// Extension point for different worker spawn strategies.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self, config: &BridgeConfig) -> Result<Child, BridgeError>;
}

/// Spawns the real worker executable from its build-output directory.
pub struct IndexWorkerSpawner;

impl WorkerSpawner for IndexWorkerSpawner {
    fn spawn(&self, config: &BridgeConfig) -> Result<Child, BridgeError> {
        let dir = config.worker_dir.canonicalize().map_err(|e| {
            BridgeError::spawn(format!(
                "worker directory {}: {e}",
                config.worker_dir.display()
            ))
        })?;
        let program = worker_program(&config.worker_bin, &dir);

        let mut cmd = Command::new(&program);
        cmd.current_dir(&dir)
            .env("PATH", prepended_path(&dir))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn()
            .map_err(|e| BridgeError::spawn(format!("{}: {e}", program.display())))
    }
}

fn worker_program(bin: &str, dir: &Path) -> PathBuf {
    let bin = Path::new(bin);
    if bin.is_absolute() {
        bin.to_path_buf()
    } else {
        dir.join(bin)
    }
}

fn prepended_path(dir: &Path) -> std::ffi::OsString {
    let mut path = dir.as_os_str().to_os_string();
    if let Some(existing) = std::env::var_os("PATH") {
        path.push(":");
        path.push(existing);
    }
    path
}

/// Owns the worker child process and its lifecycle state.
///
/// All methods take `&mut self`; callers serialize access through the
/// service's exchange lock.
pub struct WorkerSupervisor {
    child: Option<Child>,
    state: WorkerState,
    started_at: Option<DateTime<Utc>>,
}

impl WorkerSupervisor {
    pub fn new() -> Self {
        Self {
            child: None,
            state: WorkerState::NotStarted,
            started_at: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Spawn the worker if none is running.
    ///
    /// The worker is only Starting afterwards; the caller promotes it to
    /// Running once the readiness probe succeeds.
    pub fn spawn(&mut self, config: &BridgeConfig) -> Result<(), BridgeError> {
        if self.child.is_some() {
            return Ok(());
        }

        let child = config.spawner.spawn(config)?;
        let pid = child.id();
        tracing::info!(pid, bin = %config.worker_bin, "Spawned index worker");

        self.child = Some(child);
        self.state = WorkerState::Starting;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Promote a probed worker to Running.
    pub fn mark_running(&mut self) {
        if self.child.is_some() {
            self.state = WorkerState::Running;
        }
    }

    /// Non-blocking liveness check.
    ///
    /// A worker that exited on its own is reaped here and the handle
    /// cleared, so the next spawn starts fresh.
    pub fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                let code = status.code().unwrap_or(-1);
                tracing::warn!(code, "Index worker exited unexpectedly");
                self.child = None;
                self.state = WorkerState::Stopped;
                self.started_at = None;
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll index worker, treating as dead");
                self.child = None;
                self.state = WorkerState::Stopped;
                self.started_at = None;
                false
            }
        }
    }

    /// Stop the worker: SIGTERM to the process group, SIGKILL after the
    /// grace period, then reap. A no-op when nothing is running; a process
    /// group that is already gone counts as stopped.
    pub async fn stop(&mut self, grace: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        self.state = WorkerState::Terminating;
        self.started_at = None;

        let pid = child.id();
        tracing::info!(pid, "Stopping index worker");

        #[cfg(unix)]
        signal_group(&child, nix::sys::signal::Signal::SIGTERM);

        let exited = match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                let code = status.code().unwrap_or(-1);
                tracing::info!(pid, code, "Index worker exited after SIGTERM");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(pid, error = %e, "Wait failed after SIGTERM");
                false
            }
            Err(_) => {
                tracing::warn!(
                    pid,
                    grace_ms = grace.as_millis() as u64,
                    "Index worker did not exit in time, sending SIGKILL"
                );
                false
            }
        };

        if !exited {
            #[cfg(unix)]
            signal_group(&child, nix::sys::signal::Signal::SIGKILL);

            if let Err(e) = child.kill().await {
                tracing::warn!(pid, error = %e, "SIGKILL failed");
            }
            // Collect the exit status so the child never lingers as a zombie.
            match child.wait().await {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    tracing::info!(pid, code, "Index worker exited after SIGKILL");
                }
                Err(e) => {
                    tracing::warn!(pid, error = %e, "Failed to collect worker exit status");
                }
            }
        }

        self.state = WorkerState::Stopped;
    }
}

impl Default for WorkerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal the worker's entire process group. ESRCH means the group is
/// already gone, which callers treat as stopped.
#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Some(pid) = child.id() else { return };
    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) => {
            tracing::debug!(pid, "Worker process group already gone");
        }
        Err(e) => {
            tracing::warn!(pid, %signal, error = %e, "Failed to signal worker process group");
        }
    }
}
