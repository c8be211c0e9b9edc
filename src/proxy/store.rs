use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method};

use super::id;

/// Snapshot of a suspended request, sufficient to replay it byte-for-byte:
/// method, request-URI with its raw query, every header value, and the
/// exact body bytes.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub created: Instant,
}

impl PendingRequest {
    pub fn new(method: Method, uri: String, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            created: Instant::now(),
        }
    }
}

/// Pending approvals keyed by ticket. One lock guards the whole map; every
/// operation completes under it without touching I/O, and a fetched entry
/// leaves the map atomically so a ticket can be redeemed at most once.
pub struct ApprovalStore {
    ttl: Duration,
    items: Mutex<HashMap<String, PendingRequest>>,
}

impl ApprovalStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts the request under a fresh ticket and returns it. Expired
    /// entries are swept first, which keeps the map bounded by the number
    /// of approvals still in flight.
    pub fn store(&self, pending: PendingRequest) -> String {
        let mut items = self.items.lock().unwrap_or_else(|err| err.into_inner());
        let ttl = self.ttl;
        items.retain(|_, entry| entry.created.elapsed() <= ttl);
        let mut ticket = id::new_id();
        while items.contains_key(&ticket) {
            ticket = id::new_id();
        }
        items.insert(ticket.clone(), pending);
        ticket
    }

    /// Take-once fetch: removes the entry whether it is fresh or expired,
    /// and only returns it when fresh. An expired ticket is
    /// indistinguishable from one that never existed.
    pub fn fetch(&self, ticket: &str) -> Option<PendingRequest> {
        let mut items = self.items.lock().unwrap_or_else(|err| err.into_inner());
        let pending = items.remove(ticket)?;
        if pending.created.elapsed() > self.ttl {
            return None;
        }
        Some(pending)
    }
}
