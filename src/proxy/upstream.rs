use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Url;

use super::headers::{self, X_REQUEST_ID};
use crate::config::Config;

/// End-to-end budget for one upstream exchange, connect through body.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// One outbound call: either a live request being forwarded or a stored
/// request being replayed after approval. Replays carry no request id and
/// no peer address, so neither header is touched for them.
#[derive(Debug)]
pub struct OutboundRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub raw_query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: Bytes,
    pub request_id: Option<&'a str>,
    pub peer_addr: Option<&'a str>,
}

/// Buffered upstream response ready to relay to the caller.
#[derive(Debug)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct UpstreamClient {
    client: reqwest::Client,
    base: Url,
    add_request_id: bool,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.upstream)
            .with_context(|| format!("invalid upstream URL '{}'", config.upstream))?;
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self {
            client,
            base,
            add_request_id: config.headers.add_request_id_header,
        })
    }

    pub async fn forward(&self, request: OutboundRequest<'_>) -> Result<RelayedResponse> {
        let url = self.target_url(request.path, request.raw_query)?;

        let mut outbound = headers::forwarded_request_headers(request.headers);
        if self.add_request_id
            && let Some(request_id) = request.request_id
            && let Ok(value) = HeaderValue::from_str(request_id)
        {
            outbound.insert(X_REQUEST_ID, value);
        }
        if let Some(peer_addr) = request.peer_addr {
            headers::append_forwarded_for(&mut outbound, peer_addr);
        }

        let response = self
            .client
            .request(request.method, url)
            .headers(outbound)
            .body(request.body)
            .timeout(UPSTREAM_TIMEOUT)
            .send()
            .await
            .context("upstream request failed")?;

        let status = response.status();
        let mut response_headers = response.headers().clone();
        // The relayed body is re-framed for the caller, so transport
        // headers from the upstream hop must not survive the copy.
        headers::scrub_hop_by_hop(&mut response_headers);
        let body = response
            .bytes()
            .await
            .context("failed to read upstream response body")?;

        Ok(RelayedResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    fn target_url(&self, path: &str, raw_query: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        url.set_path(&join_paths(self.base.path(), path));
        url.set_query(raw_query);
        Ok(url)
    }
}

/// Joins the configured base path with the inbound request path, collapsing
/// the separating slash.
fn join_paths(base_path: &str, path: &str) -> String {
    if base_path.is_empty() || base_path == "/" {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_path.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
