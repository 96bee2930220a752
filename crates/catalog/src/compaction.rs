//! Weekly small-file compaction (§4.H "A compaction routine ... lists
//! partitions with > N small files and merges them into one file per
//! partition"). Runs under the same `AdvisoryLockId::EventFlush` lock as the
//! writer — both touch the same catalog paths, and there's no dedicated
//! lock ID for compaction among the stable set enumerated in §5 — so a
//! compaction pass and a flush pass never race on one partition.

use futures::TryStreamExt;
use object_store::{path::Path as ObjectPath, ObjectStore};
use openlabels_core::error::Result;
use openlabels_queue::advisory_lock::{try_advisory_lock, AdvisoryLockId};
use parquet::arrow::async_reader::ParquetObjectReader;
use parquet::arrow::async_writer::{AsyncArrowWriter, ParquetObjectWriter};
use parquet::arrow::ParquetRecordBatchStreamBuilder;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_COMPACTION_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);

pub struct CompactionJob {
    pool: PgPool,
    object_store: Arc<dyn ObjectStore>,
    small_file_threshold: usize,
}

impl CompactionJob {
    pub fn new(pool: PgPool, object_store: Arc<dyn ObjectStore>, small_file_threshold: usize) -> Self {
        Self {
            pool,
            object_store,
            small_file_threshold,
        }
    }

    /// Lists every `.parquet` file under the catalog root, groups them by
    /// parent (partition) directory, and merges any partition holding more
    /// than `small_file_threshold` files into a single compacted file.
    /// Returns the number of partitions compacted.
    pub async fn run_once(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        if !try_advisory_lock(&mut tx, AdvisoryLockId::EventFlush).await? {
            return Ok(0);
        }

        let mut by_partition: BTreeMap<ObjectPath, Vec<ObjectPath>> = BTreeMap::new();
        let mut listing = self.object_store.list(None);
        while let Some(meta) = listing.try_next().await? {
            let is_parquet = meta
                .location
                .filename()
                .map(|name| name.ends_with(".parquet"))
                .unwrap_or(false);
            if !is_parquet {
                continue;
            }
            if let Some(parent) = parent_path(&meta.location) {
                by_partition.entry(parent).or_default().push(meta.location);
            }
        }

        let mut compacted = 0u64;
        for (partition, files) in by_partition {
            if files.len() <= self.small_file_threshold {
                continue;
            }
            match self.compact_partition(&partition, &files).await {
                Ok(()) => {
                    info!(partition = %partition, files = files.len(), "compacted small files");
                    compacted += 1;
                }
                Err(err) => {
                    warn!(partition = %partition, error = %err, "partition compaction failed, will retry next cycle");
                }
            }
        }

        tx.commit().await?;
        Ok(compacted)
    }

    async fn compact_partition(&self, partition: &ObjectPath, files: &[ObjectPath]) -> Result<()> {
        let mut batches = Vec::new();
        let mut schema = None;

        for file in files {
            let reader = ParquetObjectReader::new(Arc::clone(&self.object_store), file.clone());
            let stream = ParquetRecordBatchStreamBuilder::new(reader)
                .await?
                .build()?;
            let file_batches: Vec<arrow::array::RecordBatch> = stream.try_collect().await?;
            if schema.is_none() {
                if let Some(first) = file_batches.first() {
                    schema = Some(first.schema());
                }
            }
            batches.extend(file_batches);
        }

        let Some(schema) = schema else {
            return Ok(());
        };

        let merged_path = partition.child(format!("compacted-{}.parquet", part_file_timestamp()));
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build();
        let object_writer =
            ParquetObjectWriter::new(Arc::clone(&self.object_store), merged_path.clone());
        let mut writer = AsyncArrowWriter::try_new(object_writer, schema, Some(props))?;
        for batch in &batches {
            writer.write(batch).await?;
        }
        writer.close().await?;

        for file in files {
            self.object_store.delete(file).await?;
        }

        Ok(())
    }

    /// Runs `run_once` on `DEFAULT_COMPACTION_INTERVAL` until shutdown.
    pub async fn run_forever(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(DEFAULT_COMPACTION_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        warn!(error = %err, "compaction cycle failed");
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

fn parent_path(location: &ObjectPath) -> Option<ObjectPath> {
    let parts: Vec<_> = location.parts().collect();
    if parts.len() <= 1 {
        return None;
    }
    Some(ObjectPath::from_iter(parts[..parts.len() - 1].iter().cloned()))
}

fn part_file_timestamp() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_path_strips_the_file_segment() {
        let loc = ObjectPath::from("scan_results/tenant=abc/scanned_at=2026-07-20/part-1.parquet");
        let parent = parent_path(&loc).unwrap();
        assert_eq!(
            parent.as_ref(),
            "scan_results/tenant=abc/scanned_at=2026-07-20"
        );
    }

    #[test]
    fn parent_path_returns_none_for_a_root_level_file() {
        let loc = ObjectPath::from("part-1.parquet");
        assert!(parent_path(&loc).is_none());
    }
}
