use std::net::SocketAddr;
use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::StatusCode;
use serde_json::json;
use tracing::debug;

use super::AppContext;
use super::id;
use super::store::PendingRequest;
use super::upstream::OutboundRequest;
use crate::audit::AuditEvent;
use crate::extract::{self, ExtractResult};
use crate::policy::{Action, Decision};

/// The only stage with call sites today; rules may declare others but
/// nothing evaluates them yet.
const REQUEST_STAGE: &str = "request";

/// Main pipeline: capture the body under the configured bound, extract
/// prompt text and tool names, evaluate the rules, then forward, reject,
/// or suspend. Every exit writes exactly one audit event.
pub async fn handle(
    State(app): State<AppContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let start = Instant::now();
    let request_id = id::new_id();
    let (parts, body) = request.into_parts();
    let method = parts.method;
    let path = parts.uri.path().to_string();
    let request_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let remote_addr = peer.to_string();

    let base_event = || {
        AuditEvent::builder()
            .request_id(request_id.as_str())
            .remote_addr(remote_addr.as_str())
            .method(method.as_str())
            .path(path.as_str())
            .upstream(app.config.upstream.as_str())
    };

    let body = match read_body(body, app.config.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            app.audit.append(
                base_event()
                    .decision(Action::Deny.as_str())
                    .reason("body_too_large")
                    .bytes_in(err.captured())
                    .elapsed(start.elapsed())
                    .status(StatusCode::PAYLOAD_TOO_LARGE)
                    .build(),
            );
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "body_too_large");
        }
    };

    let (extracted, decision) = inspect(&app, &body);

    match decision.action {
        Action::Deny => {
            app.audit.append(
                base_event()
                    .decision(decision.action.as_str())
                    .rule_name(decision.rule_name.as_ref())
                    .reason(decision.reason)
                    .text_sample(&extracted.text)
                    .tool_names(&extracted.tool_names)
                    .bytes_in(body.len())
                    .elapsed(start.elapsed())
                    .status(StatusCode::FORBIDDEN)
                    .build(),
            );
            error_response(StatusCode::FORBIDDEN, "blocked")
        }
        Action::Approve if !app.config.approval.enabled => {
            // Without the approval endpoint there is no way to resume the
            // request, so an approve verdict degrades to a deny.
            app.audit.append(
                base_event()
                    .decision(Action::Deny.as_str())
                    .rule_name(decision.rule_name.as_ref())
                    .reason("approval_disabled")
                    .text_sample(&extracted.text)
                    .tool_names(&extracted.tool_names)
                    .bytes_in(body.len())
                    .elapsed(start.elapsed())
                    .status(StatusCode::FORBIDDEN)
                    .build(),
            );
            error_response(StatusCode::FORBIDDEN, "approval_disabled")
        }
        Action::Approve => {
            let pending = PendingRequest::new(
                method.clone(),
                request_uri.clone(),
                parts.headers.clone(),
                body.clone(),
            );
            let ticket = app.store.store(pending);
            debug!(approval_id = %ticket, "request suspended pending approval");
            app.audit.append(
                base_event()
                    .decision(decision.action.as_str())
                    .rule_name(decision.rule_name.as_ref())
                    .reason(decision.reason)
                    .text_sample(&extracted.text)
                    .tool_names(&extracted.tool_names)
                    .approval_id(ticket.as_str())
                    .bytes_in(body.len())
                    .elapsed(start.elapsed())
                    .status(StatusCode::ACCEPTED)
                    .build(),
            );
            (
                StatusCode::ACCEPTED,
                Json(json!({ "approval_id": ticket, "status": "approval_required" })),
            )
                .into_response()
        }
        Action::Allow => {
            let outbound = OutboundRequest {
                method: method.clone(),
                path: &path,
                raw_query: parts.uri.query(),
                headers: &parts.headers,
                body: body.clone(),
                request_id: Some(request_id.as_str()),
                peer_addr: Some(remote_addr.as_str()),
            };
            match app.upstream.forward(outbound).await {
                Ok(relayed) => {
                    app.audit.append(
                        base_event()
                            .decision(decision.action.as_str())
                            .rule_name(decision.rule_name.as_ref())
                            .reason(decision.reason)
                            .text_sample(&extracted.text)
                            .tool_names(&extracted.tool_names)
                            .bytes_in(body.len())
                            .bytes_out(relayed.body.len())
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
                        base_event()
                            .decision(decision.action.as_str())
                            .rule_name(decision.rule_name.as_ref())
                            .reason(error.as_str())
                            .text_sample(&extracted.text)
                            .tool_names(&extracted.tool_names)
                            .bytes_in(body.len())
                            .elapsed(start.elapsed())
                            .status(StatusCode::BAD_GATEWAY)
                            .error(error.as_str())
                            .build(),
                    );
                    error_response(StatusCode::BAD_GATEWAY, "upstream_error")
                }
            }
        }
    }
}

/// Parse failures become policy denials rather than transport errors, so
/// they surface in the same audit stream as rule matches.
fn inspect(app: &AppContext, body: &Bytes) -> (ExtractResult, Decision) {
    match extract::from_json(body) {
        Ok(extracted) => {
            let decision =
                app.evaluator
                    .evaluate(REQUEST_STAGE, &extracted.text, &extracted.tool_names);
            (extracted, decision)
        }
        Err(_) => (
            ExtractResult::default(),
            Decision::synthetic_deny("invalid_json"),
        ),
    }
}

#[derive(Debug)]
pub(crate) enum BodyError {
    TooLarge { captured: usize },
    Read { captured: usize },
}

impl BodyError {
    fn captured(&self) -> usize {
        match self {
            BodyError::TooLarge { captured } | BodyError::Read { captured } => *captured,
        }
    }
}

/// Buffers the request body up to `limit` bytes. Anything past the limit,
/// or a failed read, aborts the capture; callers treat both the same way.
pub(crate) async fn read_body(body: Body, limit: usize) -> Result<Bytes, BodyError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(_) => {
                return Err(BodyError::Read {
                    captured: buf.len(),
                });
            }
        };
        if buf.len() + chunk.len() > limit {
            let room = limit - buf.len();
            buf.extend_from_slice(&chunk[..room]);
            return Err(BodyError::TooLarge { captured: buf.len() });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

pub(crate) fn error_response(status: StatusCode, tag: &str) -> Response {
    (status, Json(json!({ "error": tag }))).into_response()
}
