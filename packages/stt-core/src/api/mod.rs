//! HTTP/WebSocket API layer.
//!
//! Thin handlers that delegate to the session pipeline in [`crate::session`],
//! [`crate::feeder`], [`crate::stabilizer`], etc. This module owns router
//! construction and server startup only.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::recorder::SttRecorder;
use crate::session::SessionSlot;

pub mod ws;

/// Constructs a fresh, uninitialized recognizer for a new session.
pub type RecorderFactory = Arc<dyn Fn() -> Box<dyn SttRecorder + Send> + Send + Sync>;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server task failed while serving connections.
    #[error("server task failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Deployment-tunable configuration.
    pub config: Arc<Config>,
    /// Process-wide single-session admission slot.
    pub session_slot: Arc<SessionSlot>,
    /// Builds a fresh recognizer per accepted session.
    pub recorder_factory: RecorderFactory,
}

/// Builder for constructing an [`AppState`].
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Arc<Config>>,
    session_slot: Option<Arc<SessionSlot>>,
    recorder_factory: Option<RecorderFactory>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn session_slot(mut self, slot: Arc<SessionSlot>) -> Self {
        self.session_slot = Some(slot);
        self
    }

    #[must_use]
    pub fn recorder_factory(mut self, factory: RecorderFactory) -> Self {
        self.recorder_factory = Some(factory);
        self
    }

    /// Builds the `AppState`, defaulting an unset session slot to a fresh one.
    ///
    /// # Panics
    /// Panics if `config` or `recorder_factory` were never set.
    #[must_use]
    #[allow(clippy::unwrap_or_default)]
    pub fn build(self) -> AppState {
        AppState {
            config: self.config.expect("config is required"),
            session_slot: self.session_slot.unwrap_or_else(SessionSlot::new),
            recorder_factory: self.recorder_factory.expect("recorder_factory is required"),
        }
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    busy: bool,
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        busy: state.session_slot.is_busy(),
    })
}

/// Builds the axum router for the STT streaming API.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the HTTP server bound to `addr`.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    log::info!("stt-server listening on {addr}");
    let app = create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
