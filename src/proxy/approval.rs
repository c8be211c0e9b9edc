use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use http::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::AppContext;
use super::headers::X_APPROVAL_TOKEN;
use super::pipeline::{error_response, read_body};
use super::upstream::OutboundRequest;
use crate::audit::AuditEvent;
use crate::policy::Action;

/// The approver's own request body is small by construction; cap it well
/// below the proxy's configurable body bound.
const APPROVAL_BODY_LIMIT: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct ApprovalPayload {
    #[serde(default)]
    approval_id: String,
}

/// Out-of-band approval endpoint: authenticates the approver, redeems the
/// ticket, and replays the suspended request exactly as captured. The
/// preconditions are checked in a fixed order so each failure mode keeps a
/// distinct response.
pub async fn handle(State(app): State<AppContext>, request: Request) -> Response {
    if !app.config.approval.enabled {
        return error_response(StatusCode::NOT_FOUND, "approval_disabled");
    }
    if request.method() != Method::POST {
        return error_response(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed");
    }
    let token = app.config.approval.token.as_str();
    if !token.is_empty() {
        let presented = request
            .headers()
            .get(&X_APPROVAL_TOKEN)
            .and_then(|value| value.to_str().ok());
        if presented != Some(token) {
            return error_response(StatusCode::UNAUTHORIZED, "invalid_token");
        }
    }

    let body = request.into_body();
    let Ok(body) = read_body(body, APPROVAL_BODY_LIMIT).await else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_body");
    };
    let payload: ApprovalPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid_approval_id"),
    };
    if payload.approval_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_approval_id");
    }

    let Some(pending) = app.store.fetch(&payload.approval_id) else {
        return error_response(StatusCode::NOT_FOUND, "approval_not_found");
    };
    debug!(approval_id = %payload.approval_id, "replaying approved request");

    let start = Instant::now();
    let (path, raw_query) = split_request_uri(&pending.uri);
    let outbound = OutboundRequest {
        method: pending.method.clone(),
        path,
        raw_query,
        headers: &pending.headers,
        body: pending.body.clone(),
        request_id: None,
        peer_addr: None,
    };

    match app.upstream.forward(outbound).await {
        Ok(relayed) => {
            app.audit.append(
                AuditEvent::builder()
                    .decision(Action::Approve.as_str())
                    .rule_name("approval_handler")
                    .reason("approved_request")
                    .upstream(app.config.upstream.as_str())
                    .approval_id(payload.approval_id.as_str())
                    .elapsed(start.elapsed())
                    .status(relayed.status)
                    .build(),
            );
            let mut response = Response::new(Body::from(relayed.body));
            *response.status_mut() = relayed.status;
            *response.headers_mut() = relayed.headers;
            response
        }
        Err(err) => {
            let error = format!("{err:#}");
            app.audit.append(
                AuditEvent::builder()
                    .decision(Action::Approve.as_str())
                    .rule_name("approval_handler")
                    .reason(error.as_str())
                    .upstream(app.config.upstream.as_str())
                    .approval_id(payload.approval_id.as_str())
                    .elapsed(start.elapsed())
                    .status(StatusCode::BAD_GATEWAY)
                    .error(error.as_str())
                    .build(),
            );
            error_response(StatusCode::BAD_GATEWAY, "upstream_error")
        }
    }
}

/// Splits a captured request-URI back into path and raw query.
fn split_request_uri(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}
