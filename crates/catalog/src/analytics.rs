//! Embedded in-process columnar query facade (§4.H "analytics engine").
//! Registers each table's partition root as a Hive-partitioned
//! `ListingTable` view so dashboard aggregation queries run against the
//! catalog via ordinary SQL; operational point-lookups keep going through
//! `openlabels-orchestrator`'s repository instead.

use crate::tables::CatalogTable;
use datafusion::datasource::file_format::parquet::ParquetFormat;
use datafusion::datasource::listing::{
    ListingOptions, ListingTable, ListingTableConfig, ListingTableUrl,
};
use datafusion::execution::context::SessionContext;
use datafusion::prelude::DataFrame;
use object_store::ObjectStore;
use openlabels_core::error::{Error, ErrorCode, Result};
use std::sync::Arc;

pub struct AnalyticsEngine {
    ctx: SessionContext,
}

impl AnalyticsEngine {
    /// Builds a fresh session and registers every catalog table as a
    /// Hive-partitioned view under its own table name. `root_url` is the
    /// object-store URL (e.g. `file:///var/lib/openlabels/catalog` or
    /// `s3://bucket/prefix`) the catalog was written under.
    pub async fn new(object_store: Arc<dyn ObjectStore>, root_url: &str) -> Result<Self> {
        let ctx = SessionContext::new();

        let base_url = url::Url::parse(root_url)
            .map_err(|err| Error::new(ErrorCode::ConfigurationError, err.to_string()))?;
        ctx.runtime_env()
            .register_object_store(&base_url, Arc::clone(&object_store));

        for table in CatalogTable::ALL {
            let table_url = ListingTableUrl::parse(format!(
                "{}/{}/",
                root_url.trim_end_matches('/'),
                table.name()
            ))
            .map_err(|err| Error::new(ErrorCode::ConfigurationError, err.to_string()))?;

            let listing_options =
                ListingOptions::new(Arc::new(ParquetFormat::new())).with_file_extension(".parquet");

            let config = ListingTableConfig::new(table_url)
                .with_listing_options(listing_options)
                .with_schema(table.schema());

            let listing_table = ListingTable::try_new(config)
                .map_err(|err| Error::new(ErrorCode::StorageError, err.to_string()))?;

            ctx.register_table(table.name(), Arc::new(listing_table))
                .map_err(|err| Error::new(ErrorCode::StorageError, err.to_string()))?;
        }

        Ok(Self { ctx })
    }

    /// Runs a dashboard aggregation query against the registered views.
    /// Callers are expected to write queries in terms of the fixed table
    /// names (`scan_results`, `file_access_events`, `audit_log`,
    /// `monitored_files`, `remediation_actions`).
    pub async fn query(&self, sql: &str) -> Result<DataFrame> {
        self.ctx
            .sql(sql)
            .await
            .map_err(|err| Error::new(ErrorCode::ValidationFailed, err.to_string()))
    }
}
