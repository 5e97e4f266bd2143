//! indexlet server binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use indexlet::{BridgeConfig, IndexService, ServerConfig, serve};

/// Initialize tracing with INDEXLET_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("INDEXLET_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("indexlet={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn bridge_config_from_env() -> Result<BridgeConfig> {
    let mut config = BridgeConfig::new();

    if let Ok(bin) = std::env::var("INDEXLET_WORKER_BIN") {
        config = config.with_worker_bin(bin);
    }
    if let Ok(dir) = std::env::var("INDEXLET_WORKER_DIR") {
        config = config.with_worker_dir(dir);
    }
    if let Ok(host) = std::env::var("INDEXLET_WORKER_HOST") {
        config.worker_host = host;
    }
    if let Ok(port) = std::env::var("INDEXLET_WORKER_PORT") {
        config.worker_port = port
            .parse()
            .context("INDEXLET_WORKER_PORT must be a port number")?;
    }

    Ok(config)
}

fn server_config_from_env() -> Result<ServerConfig> {
    let mut config = ServerConfig::default();

    if let Ok(host) = std::env::var("INDEXLET_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("INDEXLET_PORT") {
        config.port = port
            .parse()
            .context("INDEXLET_PORT must be a port number")?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("indexlet {}", env!("CARGO_PKG_VERSION"));

    let bridge_config = bridge_config_from_env()?;
    let server_config = server_config_from_env()?;

    // The worker starts lazily on the first operation, not here.
    let service = Arc::new(IndexService::new(bridge_config));

    serve(server_config, service).await
}
