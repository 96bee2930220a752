//! Per-sink adapters (§4.I, §6). Each implements [`SiemSink`] and owns its
//! own wire framing; the engine in `crate::engine` only ever sees the trait.

pub mod elastic;
pub mod qradar;
pub mod sentinel;
pub mod splunk;
pub mod syslog_cef;

use crate::record::ExportRecord;
use async_trait::async_trait;
use openlabels_core::error::Result;

/// A SIEM-specific export destination. `export_batch` returns the count of
/// records the sink actually ingested — the engine only advances its cursor
/// past a chunk when that count equals the chunk size (§4.I "Cursors only
/// advance on `count_sent == count_submitted` for the final chunk").
#[async_trait]
pub trait SiemSink: Send + Sync {
    async fn export_batch(&self, records: &[ExportRecord]) -> Result<usize>;
    async fn test_connection(&self) -> Result<bool>;
    fn name(&self) -> &'static str;
}

pub use elastic::ElasticSink;
pub use qradar::QRadarSink;
pub use sentinel::SentinelSink;
pub use splunk::SplunkSink;
pub use syslog_cef::SyslogCefSink;
