//! # Saltmesh Warden Entry Point
//!
//! ## Configuration Modes
//!
//! ### Mode 1: config file
//! ```text
//! saltmesh-warden /etc/saltmesh/warden.toml
//! ```
//!
//! ### Mode 2: environment variables
//! ```text
//! saltmesh-warden
//! ```
//! Recognized variables: `APP_ENV`, `PKI_DIR_PATH`, `MASTER_CONF_PATH`,
//! `WARDEN_HTTP_BIND`, plus `RUST_LOG` for log filtering.
//!
//! ## Startup Flow
//! 1. Initialize tracing
//! 2. Load configuration
//! 3. Create the trust-store directory layout if missing
//! 4. Start the event drain loop
//! 5. Serve the HTTP surface until ctrl-c

use std::env;

use anyhow::Context;
use tracing::info;

use saltmesh_common::WardenConfig;
use saltmesh_warden::cli;
use saltmesh_warden::{WARDEN_NAME, WARDEN_VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::init_tracing();

    let config = match env::args().nth(1) {
        Some(path) => WardenConfig::load_from_file(&path)
            .map_err(|err| anyhow::anyhow!("failed to load config {}: {}", path, err))?,
        None => WardenConfig::from_env(),
    };
    info!(
        service = WARDEN_NAME,
        version = WARDEN_VERSION,
        env = %config.env,
        pki_dir = %config.pki_dir.display(),
        "starting"
    );

    let parts = cli::assemble(&config)
        .await
        .context("failed to assemble service")?;

    let listener = tokio::net::TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind))?;
    info!(bind = %config.http_bind, "http surface listening");

    axum::serve(listener, parts.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    parts.event_loop.abort();
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
