use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::any;
use tokio::net::TcpListener;
use tracing::info;

use super::{AppContext, approval, pipeline};

/// The approval endpoint is the one carved-out path; everything else flows
/// through the inspection pipeline regardless of method.
pub fn router(app: AppContext) -> Router {
    Router::new()
        .route("/approve", any(approval::handle))
        .fallback(pipeline::handle)
        .with_state(app)
}

pub async fn start_listener(app: AppContext) -> Result<()> {
    let addr = app.config.listen_socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener
        .local_addr()
        .context("failed to read listener address")?;
    info!(address = %local, upstream = %app.config.upstream, "promptgate listening");

    let router = router(app);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server terminated")
}
