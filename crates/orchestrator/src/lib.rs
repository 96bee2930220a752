//! Scan orchestrator (§4.F): turns a `scan_targets` row into enumerated
//! files, detected entities, scored risk, and persisted `scan_results`,
//! choosing between a single-partition walk and a fan-out of parallel
//! partitions depending on target size and the tenant's configured
//! threshold. Plugs into the core `JobExecutor` as three `JobHandler`
//! implementations rather than running its own worker loop; the queue
//! backend (`openlabels-queue`'s `PostgresJobQueue`) is wired in by the
//! process that constructs `OrchestratorContext`.

pub mod backpressure;
pub mod config;
pub mod fanout;
pub mod handlers;
pub mod pipeline_runner;
pub mod repository;
pub mod single;
pub mod summary;
pub mod types;

pub use handlers::{
    OrchestratorContext, ScanAggregatorHandler, ScanFileHandler, ScanJobHandler, ScanPartitionHandler,
};
pub use repository::ScanRepository;
pub use types::{
    NewScanResult, PartitionSpec, ScanJobRow, ScanMode, ScanPartitionRow, ScanStatus,
    ScanTargetRow, ScanTotals,
};
