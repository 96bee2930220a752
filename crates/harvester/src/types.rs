//! Shared event shape for every provider (§4.G). Both delivery modes (pull
//! and stream) normalize into the same `RawAccessEvent` before it ever
//! touches the harvester or stream manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Read,
    Write,
    Create,
    Delete,
    Rename,
}

impl AccessAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessAction::Read => "read",
            AccessAction::Write => "write",
            AccessAction::Create => "create",
            AccessAction::Delete => "delete",
            AccessAction::Rename => "rename",
        }
    }

    /// True for the subset of actions the scan-trigger hook cares about
    /// (§4.G "Scan-trigger hook").
    pub fn triggers_rescan(self) -> bool {
        matches!(self, AccessAction::Write | AccessAction::Create)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAccessEvent {
    pub file_path: String,
    pub action: AccessAction,
    pub user: Option<String>,
    pub process: Option<String>,
    pub event_time: DateTime<Utc>,
    pub event_source: String,
}

impl RawAccessEvent {
    pub fn new(file_path: impl Into<String>, action: AccessAction, event_source: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            action,
            user: None,
            process: None,
            event_time: Utc::now(),
            event_source: event_source.into(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    pub fn with_event_time(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = event_time;
        self
    }
}
