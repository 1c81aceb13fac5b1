//! Keepalive HTTP endpoint for hosts that expect a listening port.

use axum::{Router, routing::get};
use tracing::{error, info};

/// Body returned on every keepalive path.
pub const KEEPALIVE_BODY: &str = "ok";

/// Router answering `/` and `/healthz`.
pub fn keepalive_routes() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/healthz", get(alive))
}

async fn alive() -> &'static str {
    KEEPALIVE_BODY
}

/// Serve the keepalive router on `0.0.0.0:port` in the background.
///
/// A bind failure is logged; the bot keeps running without the endpoint.
pub fn spawn_keepalive(port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(port, error = %e, "Failed to bind keepalive port");
                return;
            }
        };
        info!(port, "Keepalive endpoint started");
        if let Err(e) = axum::serve(listener, keepalive_routes()).await {
            error!(error = %e, "Keepalive server stopped");
        }
    })
}
