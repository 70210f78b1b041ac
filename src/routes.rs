use axum::{routing::get, Router};

use crate::state::AppState;
use crate::ws::handler as ws_handler;

async fn healthz() -> &'static str {
    "ok"
}

/// Build the axum Router. The gateway's only surfaces are the WebSocket
/// upgrade endpoint and a liveness probe.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/healthz", get(healthz))
        .with_state(state)
}
