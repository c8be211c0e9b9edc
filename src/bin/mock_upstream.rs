use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::http::{Method, Uri};
use bytes::Bytes;
use serde_json::{Value, json};
use tracing::info;

use promptgate::cli::LogFormat;
use promptgate::logging;

/// Stand-in upstream for manual runs: echoes what it received so the proxy's
/// forwarding behavior can be eyeballed end to end.
async fn echo(method: Method, uri: Uri, body: Bytes) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "body": String::from_utf8_lossy(&body),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logger(LogFormat::Text)?;

    let addr: SocketAddr = "0.0.0.0:9090".parse().context("invalid listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "mock upstream listening");

    let app = Router::new().fallback(echo);
    axum::serve(listener, app).await.context("server terminated")
}
