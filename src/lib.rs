pub mod audit;
pub mod cli;
pub mod config;
pub mod extract;
pub mod logging;
pub mod policy;
pub mod proxy;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::audit::{AuditSink, TimeFormat};
use crate::config::Config;
use crate::policy::Evaluator;
use crate::proxy::AppContext;
use crate::proxy::store::ApprovalStore;
use crate::proxy::upstream::UpstreamClient;

pub async fn run(config: Config) -> Result<()> {
    let time_format = TimeFormat::parse(config.time_format.as_deref())?;
    let audit = Arc::new(AuditSink::open(&config.audit_log_path, time_format)?);
    let evaluator = Arc::new(Evaluator::new(&config.rules, &config.decision_order)?);
    let store = Arc::new(ApprovalStore::new(config.approval_ttl()));
    let upstream = Arc::new(UpstreamClient::new(&config)?);

    info!(upstream = %config.upstream, rules = config.rules.len(), "configuration loaded");
    if config.approval.enabled {
        info!("approval endpoint enabled: /approve");
        if config.approval.token.is_empty() {
            warn!("approval endpoint enabled without token; /approve accepts unauthenticated requests");
        }
    }

    let app = AppContext::new(Arc::new(config), evaluator, store, audit, upstream);
    proxy::run(app).await
}
