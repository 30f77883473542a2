mod config;
mod room;
mod signaling;

pub use config::*;
pub use room::*;
pub use signaling::*;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

/// Builds the relay's HTTP surface: the room WebSocket and a health probe.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/ws/meeting/{room_id}", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Serves the relay on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("Signaling relay listening on ws://{}", addr);

    axum::serve(listener, router(RelayState::new(&config)))
        .await
        .context("relay server stopped")
}
