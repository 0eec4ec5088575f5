//! WeCom Callback Server - receives platform callbacks.
//!
//! This binary provides a small web server that:
//! - Answers the callback URL verification handshake
//! - Verifies and decrypts encrypted payloads
//! - Acknowledges message deliveries and logs them
//!
//! TLS is expected to be terminated in front of this process.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wecom_callback::{router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: the log file location is part of it
    let config = Config::from_env().context("Failed to load configuration")?;

    init_logging(config.log_file.as_deref())?;

    info!("callback_server_starting");
    info!(
        port = config.port,
        callback_path = %config.callback_path,
        corp_id = %config.corp_id,
        length_byte_order = ?config.length_byte_order,
        recovery_enabled = config.enable_recovery,
        log_file = ?config.log_file,
        "config_loaded"
    );

    // Derive key material once; an invalid key stops startup
    let codec = config.codec()?;
    info!("envelope_codec_ready");

    let port = config.port;
    let app = router(AppState::new(config, codec));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "callback_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("callback_server_shutdown_complete");

    Ok(())
}

/// Initialize structured JSON logging to stdout and, optionally, a file.
///
/// The file is opened in append mode so restarts never truncate it.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("callback_server_shutting_down");
}
