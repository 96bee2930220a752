//! Orchestrator-local constants that are not tenant-configurable (they shape
//! the mechanics of fan-out, not policy). Tenant-configurable knobs
//! (`fanout_threshold`, `fanout_max_partitions`, `pipeline_max_concurrent_files`,
//! `pipeline_memory_budget_mb`) live in `openlabels_core::config::TenantOverrides`.

use std::time::Duration;

/// Job counters are flushed to `scan_jobs` after this many files, not after
/// every file (§4.F).
pub const COUNTER_BATCH_SIZE: u64 = 100;

/// `ScanPartition.last_processed_path` is updated at the same cadence.
pub const CURSOR_CHECKPOINT_INTERVAL: u64 = 100;

/// Target number of files per fan-out partition before a new partition
/// boundary is cut.
pub const DEFAULT_PARTITION_TARGET_SIZE: u64 = 5_000;

/// Safety cap on how many pages the pre-count pass samples before giving up
/// on an exact count and simply concluding "this clearly needs fan-out".
pub const MAX_PRECOUNT_PAGES: u32 = 50;

/// A partition that fails this many times is marked `failed` permanently;
/// the job can still reach `completed` with `partitions_failed > 0` (§4.F).
pub const PARTITION_MAX_RETRIES: i32 = 3;

/// Delay between aggregator re-checks while partitions are still in flight.
pub const AGGREGATOR_POLL_DELAY: Duration = Duration::from_secs(5);

/// The aggregator polls by retrying itself through the ordinary queue retry
/// path (§4.F); this bounds how long it will keep polling before giving up
/// and marking the job failed, rather than polling forever.
pub const AGGREGATOR_MAX_POLLS: u32 = 100_000;
