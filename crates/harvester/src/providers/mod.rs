//! Provider implementations for the two delivery modes described in §4.G.
//!
//! Pull providers return a cursor-bounded batch on demand
//! (`harvest(since)`); stream providers are sampled on a tight poll loop and
//! hand back whatever has accumulated since the last `collect()` call. Both
//! shapes funnel into the same `RawAccessEvent`.

pub mod fanotify;
pub mod graph_webhook;
pub mod linux_auditd;
pub mod m365;
pub mod windows_sacl;

use crate::types::RawAccessEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openlabels_core::error::Result;

/// A provider that is asked for everything new since a cursor and advances
/// that cursor itself only once the harvester has successfully persisted
/// the batch (§4.G "commits the cursor only after successful persist").
#[async_trait]
pub trait PullProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn harvest(&self, since: DateTime<Utc>) -> Result<Vec<RawAccessEvent>>;
}

/// A provider backed by a continuous event source (kernel notifications,
/// webhooks). `collect` is polled by the stream manager and should return
/// quickly, handing back whatever has queued up rather than blocking for a
/// full batch.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn collect(&self) -> Result<Vec<RawAccessEvent>>;
}

pub use fanotify::FanotifyProvider;
pub use graph_webhook::GraphWebhookProvider;
pub use linux_auditd::AuditdProvider;
pub use m365::M365AuditProvider;
pub use windows_sacl::WindowsSaclProvider;
