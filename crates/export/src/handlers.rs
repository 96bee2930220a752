//! Drives the periodic SIEM export cycle under `AdvisoryLockId::SiemExport`
//! (§4.I, §5 "Advisory locks serialize singletons ... across the replica
//! set"). Plugs into the process the same way `CatalogWriter::run_once` and
//! `PullHarvestLoop::run_once` do: one advisory-locked cycle on a fixed
//! interval, for as long as the process is up.

use crate::engine::ExportEngine;
use crate::repository::{ExportCursorRepository, ExportSourceRepository};
use chrono::{DateTime, Utc};
use openlabels_core::error::Result;
use openlabels_queue::advisory_lock::{try_advisory_lock, AdvisoryLockId};
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

pub struct PeriodicExportLoop {
    pool: PgPool,
    engine: ExportEngine,
    record_types: Vec<String>,
    interval: Duration,
}

impl PeriodicExportLoop {
    pub fn new(pool: PgPool, engine: ExportEngine, record_types: Vec<String>, interval: Duration) -> Self {
        Self {
            pool,
            engine,
            record_types,
            interval,
        }
    }

    /// Runs one export cycle: pulls newly committed rows from every source
    /// table named in `record_types` (relative to `now`, not a cursor — the
    /// engine itself filters per sink against each sink's own cursor) and
    /// fans them out. Returns `0` without doing any work if another replica
    /// already holds the lock this cycle.
    pub async fn run_once(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        if !try_advisory_lock(&mut tx, AdvisoryLockId::SiemExport).await? {
            tx.rollback().await?;
            return Ok(0);
        }
        // The lock only needs to be held long enough to establish
        // exclusivity for this cycle; the actual export I/O runs outside
        // the transaction so a slow sink doesn't hold a DB transaction open.
        tx.commit().await?;

        let window_start = self.oldest_sink_cursor().await?;
        let mut records = Vec::new();
        if self.record_types.iter().any(|t| t == "scan_results" || t == "scan_result") {
            records.extend(ExportSourceRepository::scan_results_since(&self.pool, window_start).await?);
        }
        if self.record_types.iter().any(|t| t == "file_access_events" || t == "access_event") {
            records.extend(ExportSourceRepository::access_events_since(&self.pool, window_start).await?);
        }

        if records.is_empty() {
            return Ok(0);
        }

        let counts = self.engine.export_since_last(&records).await?;
        Ok(counts.values().map(|c| *c as u64).sum())
    }

    /// The earliest point any configured sink still needs records from. Using
    /// the minimum across sinks (rather than a fixed lookback window) means a
    /// sink that's been down for a while still gets everything it missed once
    /// it recovers, instead of a gap opening up past a hardcoded window.
    async fn oldest_sink_cursor(&self) -> Result<DateTime<Utc>> {
        let mut oldest: Option<DateTime<Utc>> = None;
        for name in self.engine.sink_names() {
            match ExportCursorRepository::load_cursor(&self.pool, name).await? {
                Some(cursor) => oldest = Some(oldest.map_or(cursor, |o: DateTime<Utc>| o.min(cursor))),
                None => return Ok(DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default()),
            }
        }
        Ok(oldest.unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default()))
    }

    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(count) if count > 0 => info!(count, "periodic export cycle sent records"),
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "periodic export cycle failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
