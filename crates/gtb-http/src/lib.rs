//! OAuth callback and health server (axum).
//!
//! Routes:
//! - `GET /health`
//! - `GET /auth/github?chat=<id>`: redirect to GitHub's consent screen
//! - `GET /auth/github/callback?code&state`: finish linking and show a page

use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use gtb_core::linkage::LinkageService;

pub mod error;
pub mod handlers;
pub mod pages;

#[derive(Clone)]
pub struct HttpState {
    pub linkage: Arc<LinkageService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/github", get(handlers::authorize))
        .route("/auth/github/callback", get(handlers::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: HttpState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "callback server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
