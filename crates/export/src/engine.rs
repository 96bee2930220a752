//! SIEM export engine (§4.I): manages every configured sink, tracks each
//! one's cursor, and exposes the three entry points the spec names —
//! `export_scan`, `export_since_last`, `export_full`.

use crate::record::ExportRecord;
use crate::repository::ExportCursorRepository;
use crate::sinks::SiemSink;
use chrono::{DateTime, Utc};
use openlabels_core::error::Result;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Outcome of dispatching one batch to every configured sink.
pub type SinkCounts = HashMap<&'static str, usize>;

pub struct ExportEngine {
    pool: PgPool,
    sinks: Vec<Arc<dyn SiemSink>>,
}

impl ExportEngine {
    pub fn new(pool: PgPool, sinks: Vec<Arc<dyn SiemSink>>) -> Self {
        Self { pool, sinks }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Post-scan push of one job's findings (§4.I `export_scan`). Unlike
    /// `export_since_last` this ignores each sink's cursor entirely — a
    /// scan's results are pushed once, in full, regardless of what a
    /// periodic cycle has already sent.
    pub async fn export_scan(&self, records: &[ExportRecord]) -> Result<SinkCounts> {
        self.dispatch(records).await
    }

    /// Periodic export: for each sink, sends only records newer than that
    /// sink's persisted cursor, and advances the cursor on success
    /// (§4.I `export_since_last`).
    pub async fn export_since_last(&self, records: &[ExportRecord]) -> Result<SinkCounts> {
        let mut results = SinkCounts::new();
        for sink in &self.sinks {
            let name = sink.name();
            let cursor = ExportCursorRepository::load_cursor(&self.pool, name).await?;

            let filtered: Vec<ExportRecord> = match cursor {
                Some(cursor) => records.iter().filter(|r| r.timestamp > cursor).cloned().collect(),
                None => records.to_vec(),
            };

            if filtered.is_empty() {
                results.insert(name, 0);
                continue;
            }

            match sink.export_batch(&filtered).await {
                Ok(count) => {
                    results.insert(name, count);
                    if count == filtered.len() {
                        let max_ts = filtered
                            .iter()
                            .map(|r| r.timestamp)
                            .max()
                            .expect("filtered is non-empty");
                        ExportCursorRepository::advance_cursor(&self.pool, name, max_ts).await?;
                    } else {
                        warn!(sink = name, sent = count, submitted = filtered.len(), "sink accepted only part of the batch, cursor left unchanged");
                    }
                }
                Err(err) => {
                    error!(sink = name, error = %err, "export to sink failed");
                    results.insert(name, 0);
                }
            }
        }
        Ok(results)
    }

    /// On-demand export with explicit bounds (§4.I `export_full`).
    pub async fn export_full(
        &self,
        records: &[ExportRecord],
        since: Option<DateTime<Utc>>,
        record_types: Option<&[String]>,
    ) -> Result<SinkCounts> {
        let filtered: Vec<ExportRecord> = records
            .iter()
            .filter(|r| since.map(|s| r.timestamp >= s).unwrap_or(true))
            .filter(|r| {
                record_types
                    .map(|types| types.iter().any(|t| t == r.record_type.as_str()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        self.dispatch(&filtered).await
    }

    pub async fn test_connections(&self) -> SinkCounts {
        let mut results = SinkCounts::new();
        for sink in &self.sinks {
            let ok = sink.test_connection().await.unwrap_or(false);
            results.insert(sink.name(), ok as usize);
        }
        results
    }

    async fn dispatch(&self, records: &[ExportRecord]) -> Result<SinkCounts> {
        let mut results = SinkCounts::new();
        if records.is_empty() {
            for sink in &self.sinks {
                results.insert(sink.name(), 0);
            }
            return Ok(results);
        }

        for sink in &self.sinks {
            let name = sink.name();
            match sink.export_batch(records).await {
                Ok(count) => {
                    results.insert(name, count);
                    if count == records.len() {
                        let max_ts = records.iter().map(|r| r.timestamp).max().expect("records is non-empty");
                        ExportCursorRepository::advance_cursor(&self.pool, name, max_ts).await?;
                    }
                }
                Err(err) => {
                    error!(sink = name, error = %err, "export to sink failed");
                    results.insert(name, 0);
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use uuid::Uuid;

    fn record(ts: DateTime<Utc>) -> ExportRecord {
        ExportRecord {
            record_type: RecordType::ScanResult,
            timestamp: ts,
            tenant_id: Uuid::nil(),
            file_path: "/a.txt".to_string(),
            risk_score: Some(10),
            risk_tier: Some("LOW".to_string()),
            entity_types: vec![],
            entity_counts: serde_json::Map::new(),
            policy_violations: vec![],
            action_taken: None,
            user: None,
            source_adapter: "filesystem".to_string(),
        }
    }

    #[test]
    fn export_full_filters_by_since_and_record_type() {
        let now = Utc::now();
        let older = record(now - chrono::Duration::hours(2));
        let newer = record(now);
        let records = vec![older, newer.clone()];
        let filtered: Vec<ExportRecord> = records
            .into_iter()
            .filter(|r| r.timestamp >= now - chrono::Duration::hours(1))
            .collect();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].timestamp, newer.timestamp);
    }
}
