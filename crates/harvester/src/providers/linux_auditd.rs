//! Linux auditd pull provider. Shells out to `ausearch` the same way the
//! original CLI's `monitor enable` command drove `auditctl` — auditd's own
//! query tooling is the supported interface, there is no stable library API
//! to link against.

use crate::providers::PullProvider;
use crate::types::{AccessAction, RawAccessEvent};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use openlabels_core::error::{Error, ErrorCode, Result};
use tokio::process::Command;

pub struct AuditdProvider {
    watched_paths: Vec<String>,
}

impl AuditdProvider {
    pub fn new(watched_paths: Vec<String>) -> Self {
        Self { watched_paths }
    }

    fn build_args(&self, since: DateTime<Utc>) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            "--start".to_string(),
            since.format("%m/%d/%Y %H:%M:%S").to_string(),
        ];
        for path in &self.watched_paths {
            args.push("-f".to_string());
            args.push(path.clone());
        }
        args
    }
}

#[async_trait]
impl PullProvider for AuditdProvider {
    fn name(&self) -> &'static str {
        "auditd"
    }

    async fn harvest(&self, since: DateTime<Utc>) -> Result<Vec<RawAccessEvent>> {
        if self.watched_paths.is_empty() {
            return Ok(Vec::new());
        }

        let output = Command::new("ausearch")
            .args(self.build_args(since))
            .output()
            .await
            .map_err(|e| Error::new(ErrorCode::Transient, format!("ausearch unavailable: {e}")))?;

        if !output.status.success() && output.stdout.is_empty() {
            // ausearch exits non-zero when there are no matching records;
            // treat that as an empty batch rather than an error.
            return Ok(Vec::new());
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ausearch_output(&text))
    }
}

/// Parses `ausearch -i` text records. Each record is a block of
/// `key=value` lines; we only need `name`, `syscall`/`exe`, `auid`/`uid`,
/// and the record's leading `msg=audit(<epoch>.<ms>:...)` timestamp.
fn parse_ausearch_output(text: &str) -> Vec<RawAccessEvent> {
    let mut events = Vec::new();
    for line in text.lines() {
        if !line.starts_with("type=PATH") && !line.starts_with("type=SYSCALL") {
            continue;
        }

        let event_time = extract_field(line, "msg=audit(")
            .and_then(|raw| raw.split('.').next().map(|s| s.to_string()))
            .and_then(|secs| secs.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);

        let Some(path) = extract_quoted_field(line, "name=") else {
            continue;
        };
        let user = extract_quoted_field(line, "AUID=").or_else(|| extract_quoted_field(line, "auid="));
        let syscall = extract_quoted_field(line, "SYSCALL=").or_else(|| extract_quoted_field(line, "syscall="));

        let action = match syscall.as_deref() {
            Some(s) if s.contains("unlink") || s.contains("rmdir") => AccessAction::Delete,
            Some(s) if s.contains("rename") => AccessAction::Rename,
            Some(s) if s.contains("open") || s.contains("write") || s.contains("creat") => AccessAction::Write,
            _ => AccessAction::Read,
        };

        let mut event = RawAccessEvent::new(path, action, "auditd").with_event_time(event_time);
        if let Some(user) = user {
            event = event.with_user(user);
        }
        events.push(event);
    }
    events
}

fn extract_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let idx = line.find(key)?;
    Some(&line[idx + key.len()..])
}

fn extract_quoted_field(line: &str, key: &str) -> Option<String> {
    let idx = line.find(key)?;
    let rest = &line[idx + key.len()..];
    let value = rest.split_whitespace().next()?;
    Some(value.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_path_record_into_an_event() {
        let text = r#"type=PATH msg=audit(1700000000.123:456): item=0 name="/etc/shadow" SYSCALL=open AUID="root""#;
        let events = parse_ausearch_output(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].file_path, "/etc/shadow");
        assert_eq!(events[0].user.as_deref(), Some("root"));
    }

    #[test]
    fn ignores_unrelated_record_types() {
        let text = "type=LOGIN msg=audit(1700000000.123:456): pid=1";
        assert!(parse_ausearch_output(text).is_empty());
    }
}
