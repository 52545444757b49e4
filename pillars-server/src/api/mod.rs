//! HTTP/JSON operator API
//!
//! Runs on its own tokio runtime and reaches the session only through the
//! bridge: commands go in over a channel, state comes back from the shared
//! snapshot.

pub mod session;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bridge::{CommandSender, PillarsCommand, SharedReloadStatus, SharedSnapshot};

/// Shared state for all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub commands: CommandSender,
    pub snapshot: SharedSnapshot,
    pub reload_status: SharedReloadStatus,
}

impl ApiState {
    /// Send a command built around a fresh reply channel and wait for the
    /// answer. `None` when the session side is gone.
    pub async fn dispatch<T>(
        &self,
        build: impl FnOnce(tokio::sync::oneshot::Sender<T>) -> PillarsCommand,
    ) -> Option<T> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.commands.send(build(reply_tx)).ok()?;
        reply_rx.await.ok()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    state: String,
}

async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let label = state.snapshot.read().label.clone();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        state: label,
    })
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(session::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_api_server(
    state: ApiState,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!("Operator API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
