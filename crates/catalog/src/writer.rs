//! Flushes newly committed operational-store rows into Hive-partitioned,
//! Zstd-compressed Parquet (§4.H). Runs under `AdvisoryLockId::EventFlush`
//! so only one replica flushes a given cycle.
//!
//! Each cycle covers every active tenant and all five source tables. A
//! table's rows are selected once, then sliced into contiguous same-date
//! runs (rows arrive in ascending time order, so a run is always a
//! contiguous index range) and each run is written as its own partition
//! file. The cursor only advances past a table once every date-partition
//! file for that table's page has been written successfully.

use crate::batch::build_record_batch;
use crate::repository::{CatalogCursorRepository, CatalogSourceRepository};
use crate::tables::CatalogTable;
use openlabels_core::config::CatalogConfig;
use openlabels_core::error::Result;
use openlabels_queue::advisory_lock::{try_advisory_lock, AdvisoryLockId};
use parquet::arrow::async_writer::{AsyncArrowWriter, ParquetObjectWriter};
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use object_store::{path::Path as ObjectPath, ObjectStore};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

/// Rows fetched per `(tenant, table)` pair per cycle. Not exposed in
/// `CatalogConfig` since it's an internal batching knob rather than an
/// operator-facing tuning surface.
const FLUSH_BATCH_SIZE: i64 = 10_000;

pub struct CatalogWriter {
    pool: PgPool,
    object_store: Arc<dyn ObjectStore>,
    config: CatalogConfig,
}

impl CatalogWriter {
    pub fn new(pool: PgPool, object_store: Arc<dyn ObjectStore>, config: CatalogConfig) -> Self {
        Self {
            pool,
            object_store,
            config,
        }
    }

    fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.config.event_flush_interval_seconds)
    }

    /// Runs one flush cycle across every active tenant and table. Returns
    /// the total number of rows written, or `0` without doing any work if
    /// another replica already holds the lock this cycle.
    pub async fn run_once(&self) -> Result<u64> {
        if !self.config.enabled {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        if !try_advisory_lock(&mut tx, AdvisoryLockId::EventFlush).await? {
            return Ok(0);
        }

        let tenant_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM tenants WHERE status = 'active'")
                .fetch_all(&mut *tx)
                .await?;

        let mut total = 0u64;
        for tenant_id in tenant_ids {
            for table in CatalogTable::ALL {
                total += self.flush_one(&mut tx, tenant_id, table).await?;
            }
        }

        tx.commit().await?;
        Ok(total)
    }

    async fn flush_one(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        table: CatalogTable,
    ) -> Result<u64> {
        let cursor = CatalogCursorRepository::load_cursor(tx, table, tenant_id).await?;
        let rows =
            CatalogSourceRepository::select_rows(tx, table, tenant_id, cursor, FLUSH_BATCH_SIZE)
                .await?;

        if rows.is_empty() {
            return Ok(0);
        }

        let date_keys = rows.date_keys();
        let batch = build_record_batch(table, &rows)?;
        let row_count = rows.len();

        for (date, start, len) in contiguous_runs(&date_keys) {
            let slice = batch.slice(start, len);
            let path = ObjectPath::from(format!(
                "{table}/tenant={tenant_id}/{date_column}={date}/part-{ts}.parquet",
                table = table.name(),
                date_column = table.date_column(),
                ts = part_file_timestamp(),
            ));
            self.write_partition(&path, slice).await?;
        }

        let new_cursor = rows.last_cursor().expect("non-empty rows has a last cursor");
        CatalogCursorRepository::advance_cursor(tx, table, tenant_id, new_cursor).await?;

        Ok(row_count as u64)
    }

    async fn write_partition(
        &self,
        path: &ObjectPath,
        batch: arrow::array::RecordBatch,
    ) -> Result<()> {
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build();

        let object_writer = ParquetObjectWriter::new(Arc::clone(&self.object_store), path.clone());
        let mut writer =
            AsyncArrowWriter::try_new(object_writer, batch.schema(), Some(props))?;
        writer.write(&batch).await?;
        writer.close().await?;
        Ok(())
    }

    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.flush_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(count) if count > 0 => info!(count, "catalog flush cycle wrote rows"),
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "catalog flush cycle failed"),
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

/// Groups a non-decreasing sequence of date keys into contiguous
/// `(date, start, len)` runs.
fn contiguous_runs(date_keys: &[String]) -> Vec<(String, usize, usize)> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=date_keys.len() {
        if i == date_keys.len() || date_keys[i] != date_keys[start] {
            runs.push((date_keys[start].clone(), start, i - start));
            start = i;
        }
    }
    runs
}

/// Timestamp suffix for part-file names.
fn part_file_timestamp() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_runs_groups_equal_adjacent_dates() {
        let keys = vec![
            "2026-07-20".to_string(),
            "2026-07-20".to_string(),
            "2026-07-21".to_string(),
        ];
        let runs = contiguous_runs(&keys);
        assert_eq!(runs, vec![
            ("2026-07-20".to_string(), 0, 2),
            ("2026-07-21".to_string(), 2, 1),
        ]);
    }

    #[test]
    fn contiguous_runs_handles_empty_input() {
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn contiguous_runs_handles_all_same_date() {
        let keys = vec!["2026-07-20".to_string(); 5];
        let runs = contiguous_runs(&keys);
        assert_eq!(runs, vec![("2026-07-20".to_string(), 0, 5)]);
    }
}
