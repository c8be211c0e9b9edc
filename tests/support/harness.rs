use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use promptgate::cli::LogFormat;
use promptgate::config::{ApprovalConfig, Config, HeaderConfig, Rule, RuleMatch};

use super::net::{find_free_port, wait_for_listener};

/// A config pointing at the given upstream, with everything else at test
/// defaults; individual tests adjust rules, order, and approval settings.
pub fn base_config(upstream: &str) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        upstream: upstream.to_string(),
        audit_log_path: PathBuf::from("audit.jsonl"),
        max_body_bytes: 1024 * 1024,
        time_format: None,
        decision_order: Vec::new(),
        log: LogFormat::Text,
        approval: ApprovalConfig::default(),
        headers: HeaderConfig::default(),
        rules: Vec::new(),
    }
}

pub fn pattern_rule(name: &str, action: &str, pattern: &str) -> Rule {
    Rule {
        name: name.to_string(),
        stage: "request".to_string(),
        action: action.to_string(),
        matcher: RuleMatch {
            pattern: pattern.to_string(),
            tool_names: Vec::new(),
            field: String::new(),
        },
    }
}

pub fn tool_rule(name: &str, action: &str, tool_names: &[&str]) -> Rule {
    Rule {
        name: name.to_string(),
        stage: "request".to_string(),
        action: action.to_string(),
        matcher: RuleMatch {
            pattern: String::new(),
            tool_names: tool_names.iter().map(|t| t.to_string()).collect(),
            field: String::new(),
        },
    }
}

/// In-process proxy bound to a loopback port, with its audit log in a
/// scratch directory the harness owns.
pub struct ProxyHarness {
    pub addr: SocketAddr,
    pub audit_path: PathBuf,
    _audit_dir: TempDir,
    handle: JoinHandle<()>,
}

impl ProxyHarness {
    pub async fn spawn(mut config: Config) -> Result<Self> {
        let audit_dir = TempDir::new().context("failed to create audit scratch dir")?;
        let audit_path = audit_dir.path().join("audit.jsonl");
        config.audit_log_path = audit_path.clone();

        let port = find_free_port()?;
        let addr: SocketAddr = format!("127.0.0.1:{port}")
            .parse()
            .context("invalid harness listen address")?;
        config.listen_addr = addr.to_string();

        let handle = tokio::spawn(async move {
            if let Err(err) = promptgate::run(config).await {
                eprintln!("proxy exited with error: {err:?}");
            }
        });
        wait_for_listener(addr).await?;

        Ok(Self {
            addr,
            audit_path,
            _audit_dir: audit_dir,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Parses the audit log back into JSON values, one per line.
    pub fn audit_events(&self) -> Vec<serde_json::Value> {
        let Ok(contents) = fs::read_to_string(&self.audit_path) else {
            return Vec::new();
        };
        contents
            .lines()
            .map(|line| serde_json::from_str(line).expect("audit line is valid JSON"))
            .collect()
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
