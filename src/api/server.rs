//! HTTP server lifecycle.

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AppError, Result};

/// Serve `router` on an already-bound listener until `ct` is cancelled.
///
/// In-flight requests are allowed to finish before this returns.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener has no local address or the
/// server exits with an error.
pub async fn serve_listener(
    listener: TcpListener,
    router: Router,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("listener has no local address: {err}")))?;

    info!(%local, "starting HTTP API");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}
