//! HTTP API.
//!
//! Thin axum layer: handlers decode JSON or multipart bodies, call the
//! workflow or a media collaborator, and map [`AppError`](crate::AppError)
//! values to status codes through [`error::ApiError`].

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{AppError, Result};

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use server::serve_listener;
pub use state::AppState;

/// Largest accepted audio upload.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// CORS policy for the configured origins.
///
/// Credentials are allowed, so methods and headers mirror the request
/// rather than using a wildcard.
///
/// # Errors
///
/// Returns `AppError::Config` if an origin is not a valid header value.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| AppError::Config(format!("invalid CORS origin {origin:?}: {err}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Build the API router.
///
/// # Errors
///
/// Returns `AppError::Config` if the CORS configuration is invalid.
pub fn build_router(state: Arc<AppState>) -> Result<Router> {
    let cors = cors_layer(&state.config.allowed_origins)?;

    Ok(Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/hello", get(routes::health::hello))
        .route(
            "/api/start_research",
            post(routes::research::start_research),
        )
        .route("/api/resume", post(routes::research::resume))
        .route("/api/reset", post(routes::research::reset))
        .route(
            "/api/sessions/{id}",
            get(routes::research::session_status).delete(routes::research::discard_session),
        )
        .route(
            "/api/transcribe",
            post(routes::media::transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/api/generate_pdf", post(routes::media::generate_pdf))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
