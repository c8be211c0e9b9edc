use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use http::StatusCode;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::{self, OwnedFormatItem, well_known::Rfc3339};
use tracing::warn;

const TEXT_SAMPLE_BYTES: usize = 200;

/// One structured record per terminal response, appended as a JSON line.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditEvent {
    pub time: String,
    pub request_id: String,
    pub remote_addr: String,
    pub method: String,
    pub path: String,
    pub decision: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rule_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text_sample: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_names: Vec<String>,
    pub upstream: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub approval_id: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "is_zero_u16")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "is_zero")]
    pub bytes_in: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub bytes_out: usize,
    #[serde(rename = "error", skip_serializing_if = "String::is_empty")]
    pub error: String,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

fn is_zero_u16(value: &u16) -> bool {
    *value == 0
}

impl AuditEvent {
    pub fn builder() -> AuditEventBuilder {
        AuditEventBuilder {
            event: AuditEvent::default(),
        }
    }
}

#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.event.request_id = id.into();
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.event.remote_addr = addr.into();
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.event.method = method.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.event.path = path.into();
        self
    }

    pub fn decision(mut self, decision: impl Into<String>) -> Self {
        self.event.decision = decision.into();
        self
    }

    pub fn rule_name(mut self, rule_name: impl Into<String>) -> Self {
        self.event.rule_name = rule_name.into();
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.event.reason = reason.into();
        self
    }

    /// Records at most the first 200 bytes of the extracted text, backing
    /// off to the nearest character boundary.
    pub fn text_sample(mut self, text: &str) -> Self {
        self.event.text_sample = sample(text);
        self
    }

    pub fn tool_names(mut self, tool_names: &[String]) -> Self {
        self.event.tool_names = tool_names.to_vec();
        self
    }

    pub fn upstream(mut self, upstream: impl Into<String>) -> Self {
        self.event.upstream = upstream.into();
        self
    }

    pub fn approval_id(mut self, approval_id: impl Into<String>) -> Self {
        self.event.approval_id = approval_id.into();
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.event.elapsed_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.event.status_code = status.as_u16();
        self
    }

    pub fn bytes_in(mut self, bytes: usize) -> Self {
        self.event.bytes_in = bytes;
        self
    }

    pub fn bytes_out(mut self, bytes: usize) -> Self {
        self.event.bytes_out = bytes;
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = error.into();
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

fn sample(text: &str) -> String {
    if text.len() <= TEXT_SAMPLE_BYTES {
        return text.to_string();
    }
    let mut end = TEXT_SAMPLE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Timestamp layout for audit events, fixed at configuration load.
#[derive(Debug, Clone)]
pub enum TimeFormat {
    Rfc3339,
    Custom(OwnedFormatItem),
}

impl TimeFormat {
    pub fn parse(spec: Option<&str>) -> Result<Self> {
        match spec {
            None | Some("") => Ok(TimeFormat::Rfc3339),
            Some(spec) => {
                let items = format_description::parse_owned::<2>(spec)
                    .with_context(|| format!("invalid time_format '{spec}'"))?;
                Ok(TimeFormat::Custom(items))
            }
        }
    }

    fn format(&self, now: OffsetDateTime) -> Result<String> {
        let formatted = match self {
            TimeFormat::Rfc3339 => now.format(&Rfc3339)?,
            TimeFormat::Custom(items) => now.format(items)?,
        };
        Ok(formatted)
    }
}

/// Append-only JSON-Lines sink. A single lock serializes marshal+write, so
/// events land whole and in write order; nothing else synchronizes on it.
pub struct AuditSink {
    file: Mutex<File>,
    time_format: TimeFormat,
}

impl AuditSink {
    pub fn open(path: &Path, time_format: TimeFormat) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(path)
            .with_context(|| format!("failed to open audit log at {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
            time_format,
        })
    }

    /// Best-effort append: a failed write is logged and otherwise ignored so
    /// an audit fault can never change a caller-visible response.
    pub fn append(&self, mut event: AuditEvent) {
        event.time = match self.time_format.format(OffsetDateTime::now_utc()) {
            Ok(time) => time,
            Err(err) => {
                warn!(error = %err, "failed to format audit timestamp");
                String::new()
            }
        };
        if let Err(err) = self.write_line(&event) {
            warn!(error = %err, "failed to append audit event");
        }
    }

    fn write_line(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event).context("failed to encode audit event")?;
        line.push(b'\n');
        let mut file = self.file.lock().unwrap_or_else(|err| err.into_inner());
        file.write_all(&line).context("failed to write audit line")?;
        Ok(())
    }
}
