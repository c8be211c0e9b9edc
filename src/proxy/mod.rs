pub mod approval;
pub mod headers;
pub mod id;
pub mod listener;
pub mod pipeline;
pub mod store;
pub mod upstream;

use std::sync::Arc;

use anyhow::Result;

use crate::audit::AuditSink;
use crate::config::Config;
use crate::policy::Evaluator;
use store::ApprovalStore;
use upstream::UpstreamClient;

/// Everything a request handler needs, shared across connection tasks.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub evaluator: Arc<Evaluator>,
    pub store: Arc<ApprovalStore>,
    pub audit: Arc<AuditSink>,
    pub upstream: Arc<UpstreamClient>,
}

impl AppContext {
    pub fn new(
        config: Arc<Config>,
        evaluator: Arc<Evaluator>,
        store: Arc<ApprovalStore>,
        audit: Arc<AuditSink>,
        upstream: Arc<UpstreamClient>,
    ) -> Self {
        Self {
            config,
            evaluator,
            store,
            audit,
            upstream,
        }
    }
}

pub async fn run(app: AppContext) -> Result<()> {
    listener::start_listener(app).await
}
