pub mod audit;
pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod security;
pub mod types;

pub use audit::{AuditEvent, AuditLogger, AuditRepository};
pub use config::{Config, CorsConfig};
pub use database::DatabasePool;
pub use error::{Error, ErrorCode, ErrorContext, ErrorMetrics, Result};
pub use jobs::{JobExecutor, JobQueue, SerializableJob};
pub use metrics::{MetricsRegistry, MetricsService};
pub use types::*;

// Re-export commonly used types from dependencies
pub use uuid::Uuid;
pub use chrono::{DateTime, Utc};
