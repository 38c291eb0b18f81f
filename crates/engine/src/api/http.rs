//! HTTP routes.
//!
//! Hosting platforms ping the bot over HTTP to keep it awake; nothing here
//! touches the draw state.

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Create all HTTP routes.
pub fn routes() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/api/health", get(health))
}

async fn alive() -> &'static str {
    "Bot is alive!"
}

async fn health() -> &'static str {
    "OK"
}

/// Bind the first candidate port that is free.
pub async fn bind_first_free(host: &str, ports: &[u16]) -> Option<TcpListener> {
    for &port in ports {
        let addr = format!("{host}:{port}");
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Some(listener),
            Err(e) => tracing::debug!(addr = %addr, error = %e, "Port unavailable"),
        }
    }
    None
}

/// Serve the keep-alive routes in the background.
///
/// Returns `None` when no candidate port could be bound; the bot keeps
/// running without the endpoint.
pub async fn spawn_keep_alive(host: &str, ports: &[u16]) -> Option<(SocketAddr, JoinHandle<()>)> {
    let Some(listener) = bind_first_free(host, ports).await else {
        tracing::error!(?ports, "No free port for the keep-alive server");
        return None;
    };

    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "Keep-alive listener has no local address");
            return None;
        }
    };
    tracing::info!("Keep-alive listening on {}", addr);

    let router = routes().layer(TraceLayer::new_for_http());
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Keep-alive server stopped");
        }
    });
    Some((addr, handle))
}
