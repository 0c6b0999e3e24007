//! Liveness and greeting endpoints.

use axum::Json;

use crate::api::dto::MessageResponse;

/// `GET /health`, plain-text liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/hello`
pub async fn hello() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello from the Nexus research API!".into(),
    })
}
