//! indexlet: service bridge for index-store symbol queries.
//!
//! Supervises the native `IndexStoreService` worker process, speaks its
//! line-delimited JSON protocol over a local TCP socket, and exposes the
//! worker's query operations over HTTP with input validation, a uniform
//! error envelope, and signal-clean shutdown.

pub mod bridge;
mod config;
mod connection;
mod error;
mod ops;
mod params;
pub mod service;
mod supervisor;
pub mod transport;

pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorKind};
pub use params::{Role, SearchOption};
pub use service::{IndexService, ServiceStage, ServiceStatus};
pub use supervisor::{IndexWorkerSpawner, WorkerSpawner, WorkerState};
pub use transport::{ServerConfig, serve};
