//! stt-server — standalone server for the realtime speech-to-text streaming
//! service.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stt_core::recorder::{MockRecorder, SttRecorder};
use stt_core::{start_server, AppState, SessionSlot};
use tokio::signal;

use crate::config::ServerConfig;

/// Headless realtime speech-to-text streaming server.
#[derive(Parser, Debug)]
#[command(name = "stt-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "STT_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "STT_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("stt-server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    let core_config = Arc::new(config.to_core_config());
    let app_state = AppState::builder()
        .config(Arc::clone(&core_config))
        .session_slot(SessionSlot::new())
        .recorder_factory(Arc::new(|| -> Box<dyn SttRecorder + Send> {
            Box::new(MockRecorder::new(3))
        }))
        .build();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, addr).await {
            log::error!("Server error: {e}");
        }
    });

    log::info!("HTTP server started on port {}", config.bind_port);

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    server_handle.abort();
    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
