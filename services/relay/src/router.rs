//! Axum Router Configuration
//!
//! Two routes: the liveness endpoint and the telephony WebSocket upgrade.

use crate::{handlers, state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the relay.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
