//! Plain HTTP handlers.
//!
//! Everything interesting happens on the WebSocket route; this module only
//! serves the liveness payload.

use axum::response::Json;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Fixed liveness response, served at `/`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "WebSocket relay is running",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_a_fixed_status() {
        let Json(response) = health().await;
        assert_eq!(response.status, "WebSocket relay is running");
    }
}
