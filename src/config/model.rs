use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;

use crate::cli::LogFormat;
use crate::policy::Action;

fn default_listen_addr() -> String {
    ":8080".to_string()
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("audit.jsonl")
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_approval_ttl() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub upstream: String,
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Format description for audit timestamps; RFC 3339 when unset.
    #[serde(default)]
    pub time_format: Option<String>,
    #[serde(default)]
    pub decision_order: Vec<String>,
    #[serde(default)]
    pub log: LogFormat,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub headers: HeaderConfig,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    /// Pending-request lifetime in seconds.
    #[serde(default = "default_approval_ttl")]
    pub ttl: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            ttl: default_approval_ttl(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderConfig {
    #[serde(default)]
    pub add_request_id_header: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub name: String,
    pub stage: String,
    pub action: String,
    #[serde(default, rename = "match")]
    pub matcher: RuleMatch,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleMatch {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub tool_names: Vec<String>,
    /// Reserved for a future match dimension; accepted but not evaluated.
    #[serde(default)]
    pub field: String,
}

impl Config {
    pub fn approval_ttl(&self) -> Duration {
        Duration::from_secs(self.approval.ttl)
    }

    /// Resolves `listen_addr`, accepting the `":8080"` shorthand for
    /// all-interfaces binds.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        let addr = if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        };
        addr.parse()
            .with_context(|| format!("invalid listen_addr '{}'", self.listen_addr))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.upstream.is_empty(), "upstream is required");
        let upstream = reqwest::Url::parse(&self.upstream)
            .with_context(|| format!("invalid upstream URL '{}'", self.upstream))?;
        match upstream.scheme() {
            "http" | "https" => {}
            other => bail!("upstream URL must be http or https (got '{other}')"),
        }
        self.listen_socket_addr()?;
        ensure!(
            self.max_body_bytes > 0,
            "max_body_bytes must be greater than 0 (got {})",
            self.max_body_bytes
        );
        ensure!(
            self.approval.ttl > 0,
            "approval.ttl must be greater than 0 seconds (got {})",
            self.approval.ttl
        );
        let mut seen_names = std::collections::HashSet::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            ensure!(!rule.name.is_empty(), "rule {idx} missing name");
            ensure!(
                seen_names.insert(rule.name.as_str()),
                "duplicate rule name '{}'",
                rule.name
            );
            ensure!(!rule.stage.is_empty(), "rule '{}' missing stage", rule.name);
            ensure!(
                !rule.action.is_empty(),
                "rule '{}' missing action",
                rule.name
            );
            if Action::parse(&rule.action).is_none() {
                bail!(
                    "rule '{}' has unsupported action '{}'",
                    rule.name,
                    rule.action
                );
            }
        }
        Ok(())
    }
}
