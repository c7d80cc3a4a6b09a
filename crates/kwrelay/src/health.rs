//! Plain-text liveness endpoint for hosting platforms that probe a port.

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub fn routes() -> Router {
    Router::new()
        .route("/", get(|| async { "Service is Running" }))
        .route("/health", get(|| async { "OK" }))
}

pub async fn serve(listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, routes())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
