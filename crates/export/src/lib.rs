//! SIEM export fan-out engine (§4.I): converts persisted findings into the
//! normalized [`record::ExportRecord`] shape and fans them out to
//! per-sink-cursor-tracked SIEM destinations over their native wire formats.
//! Plugs into a running process via [`handlers::PeriodicExportLoop`] for the
//! periodic mode, or is called directly for the post-scan and on-demand
//! modes (§4.I `export_scan` / `export_full`).

pub mod builder;
pub mod cef;
pub mod engine;
pub mod handlers;
pub mod record;
pub mod repository;
pub mod sinks;
pub mod syslog_transport;

pub use builder::{build_sink, build_sinks};
pub use engine::ExportEngine;
pub use handlers::PeriodicExportLoop;
pub use record::{ExportRecord, RecordType};
pub use repository::{ExportCursorRepository, ExportSourceRepository};
pub use sinks::SiemSink;
