use http::header::{CONTENT_LENGTH, HOST, HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_APPROVAL_TOKEN: HeaderName = HeaderName::from_static("x-approval-token");

/// Headers scoped to a single transport hop (RFC 7230 §6.1); they are
/// removed from every message this proxy forwards.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "proxy-connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

pub fn scrub_hop_by_hop(headers: &mut HeaderMap) {
    let doomed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in doomed {
        headers.remove(&name);
    }
}

/// Clones the inbound headers for the outbound request, preserving repeated
/// values. Hop-by-hop headers are scrubbed; `Host` and `Content-Length` are
/// dropped because the client derives them from the target URL and the
/// buffered body.
pub fn forwarded_request_headers(src: &HeaderMap) -> HeaderMap {
    let mut headers = src.clone();
    scrub_hop_by_hop(&mut headers);
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    headers
}

/// Appends the caller's address to `X-Forwarded-For`, or sets it when the
/// chain is empty.
pub fn append_forwarded_for(headers: &mut HeaderMap, remote_addr: &str) {
    let ip = forwarded_ip(remote_addr);
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Host portion of a `host:port` address; the full value when it does not
/// split cleanly. Bracketed IPv6 literals lose their brackets.
fn forwarded_ip(remote_addr: &str) -> &str {
    if let Some(rest) = remote_addr.strip_prefix('[')
        && let Some((host, _)) = rest.split_once(']')
    {
        return host;
    }
    match remote_addr.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty()
                && !host.contains(':')
                && !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit()) =>
        {
            host
        }
        _ => remote_addr,
    }
}
