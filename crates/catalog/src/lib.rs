//! Catalog writer and analytics engine (§4.H): mirrors newly committed
//! operational-store rows into Hive-partitioned Parquet under an advisory
//! lock, compacts small partition files on a weekly cadence, and exposes an
//! embedded DataFusion session for dashboard aggregation queries.

pub mod analytics;
pub mod batch;
pub mod compaction;
pub mod repository;
pub mod store;
pub mod tables;
pub mod types;
pub mod writer;

pub use analytics::AnalyticsEngine;
pub use compaction::CompactionJob;
pub use store::build_object_store;
pub use tables::CatalogTable;
pub use writer::CatalogWriter;
