//! Converts one page of `CatalogRows` into the `RecordBatch` matching its
//! table's fixed schema (§4.H step 2).

use crate::repository::CatalogRows;
use crate::tables::CatalogTable;
use arrow::array::{
    ArrayRef, FixedSizeBinaryBuilder, Int16Builder, Int32Builder, Int64Builder, ListBuilder,
    MapBuilder, RecordBatch, StringBuilder, StringDictionaryBuilder,
};
use arrow::datatypes::{Int32Type, TimestampMillisecondType};
use chrono::{DateTime, Utc};
use openlabels_core::error::Result;
use std::sync::Arc;
use uuid::Uuid;

fn uuid_bytes(id: Uuid) -> [u8; 16] {
    *id.as_bytes()
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn entity_counts_from_json(value: &serde_json::Value) -> Vec<(String, i32)> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), v.as_i64().unwrap_or(0) as i32))
                .collect()
        })
        .unwrap_or_default()
}

pub fn build_record_batch(table: CatalogTable, rows: &CatalogRows) -> Result<RecordBatch> {
    let schema = table.schema();

    let columns: Vec<ArrayRef> = match rows {
        CatalogRows::ScanResults(rows) => {
            let mut id = FixedSizeBinaryBuilder::new(16);
            let mut tenant_id = FixedSizeBinaryBuilder::new(16);
            let mut job_id = FixedSizeBinaryBuilder::new(16);
            let mut file_path = StringBuilder::new();
            let mut file_name = StringBuilder::new();
            let mut file_size = Int64Builder::new();
            let mut content_hash = StringBuilder::new();
            let mut risk_score = Int16Builder::new();
            let mut risk_tier: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut entity_counts = MapBuilder::new(None, StringBuilder::new(), Int32Builder::new());
            let mut exposure_level: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut policy_violations = StringBuilder::new();
            let mut scan_error = StringBuilder::new();
            let mut scanned_at =
                arrow::array::PrimitiveBuilder::<TimestampMillisecondType>::new();

            for row in rows {
                id.append_value(uuid_bytes(row.id))?;
                tenant_id.append_value(uuid_bytes(row.tenant_id))?;
                job_id.append_value(uuid_bytes(row.job_id))?;
                file_path.append_value(&row.file_path);
                file_name.append_value(&row.file_name);
                file_size.append_value(row.file_size);
                content_hash.append_option(row.content_hash.as_deref());
                risk_score.append_value(row.risk_score);
                risk_tier.append_value(&row.risk_tier);
                for (key, value) in entity_counts_from_json(&row.entity_counts) {
                    entity_counts.keys().append_value(key);
                    entity_counts.values().append_value(value);
                }
                entity_counts.append(true)?;
                exposure_level.append_value(&row.exposure_level);
                policy_violations.append_value(row.policy_violations.to_string());
                scan_error.append_option(row.scan_error.as_deref());
                scanned_at.append_value(millis(row.scanned_at));
            }

            vec![
                Arc::new(id.finish()),
                Arc::new(tenant_id.finish()),
                Arc::new(job_id.finish()),
                Arc::new(file_path.finish()),
                Arc::new(file_name.finish()),
                Arc::new(file_size.finish()),
                Arc::new(content_hash.finish()),
                Arc::new(risk_score.finish()),
                Arc::new(risk_tier.finish()),
                Arc::new(entity_counts.finish()),
                Arc::new(exposure_level.finish()),
                Arc::new(policy_violations.finish()),
                Arc::new(scan_error.finish()),
                Arc::new(
                    scanned_at
                        .finish()
                        .with_timezone("UTC"),
                ),
            ]
        }
        CatalogRows::FileAccessEvents(rows) => {
            let mut id = FixedSizeBinaryBuilder::new(16);
            let mut tenant_id = FixedSizeBinaryBuilder::new(16);
            let mut file_path = StringBuilder::new();
            let mut action: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut user_name = StringBuilder::new();
            let mut process_name = StringBuilder::new();
            let mut event_time =
                arrow::array::PrimitiveBuilder::<TimestampMillisecondType>::new();
            let mut event_source: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();

            for row in rows {
                id.append_value(uuid_bytes(row.id))?;
                tenant_id.append_value(uuid_bytes(row.tenant_id))?;
                file_path.append_value(&row.file_path);
                action.append_value(&row.action);
                user_name.append_option(row.user_name.as_deref());
                process_name.append_option(row.process_name.as_deref());
                event_time.append_value(millis(row.event_time));
                event_source.append_value(&row.event_source);
            }

            vec![
                Arc::new(id.finish()),
                Arc::new(tenant_id.finish()),
                Arc::new(file_path.finish()),
                Arc::new(action.finish()),
                Arc::new(user_name.finish()),
                Arc::new(process_name.finish()),
                Arc::new(event_time.finish().with_timezone("UTC")),
                Arc::new(event_source.finish()),
            ]
        }
        CatalogRows::AuditLog(rows) => {
            let mut id = StringBuilder::new();
            let mut event_type: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut severity: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut event_time =
                arrow::array::PrimitiveBuilder::<TimestampMillisecondType>::new();
            let mut actor_id = StringBuilder::new();
            let mut impersonator_id = StringBuilder::new();
            let mut tenant_id = FixedSizeBinaryBuilder::new(16);
            let mut request_id = StringBuilder::new();
            let mut resource_type = StringBuilder::new();
            let mut resource_id = StringBuilder::new();
            let mut source_ip = StringBuilder::new();
            let mut user_agent = StringBuilder::new();
            let mut description = StringBuilder::new();
            let mut outcome: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut tags = ListBuilder::new(StringBuilder::new());
            let mut created_at =
                arrow::array::PrimitiveBuilder::<TimestampMillisecondType>::new();

            for row in rows {
                id.append_value(&row.id);
                event_type.append_value(&row.event_type);
                severity.append_value(&row.severity);
                event_time.append_value(millis(row.event_time));
                actor_id.append_option(row.actor_id.as_deref());
                impersonator_id.append_option(row.impersonator_id.as_deref());
                match row.tenant_id {
                    Some(tid) => tenant_id.append_value(uuid_bytes(tid))?,
                    None => tenant_id.append_null(),
                }
                request_id.append_option(row.request_id.as_deref());
                resource_type.append_option(row.resource_type.as_deref());
                resource_id.append_option(row.resource_id.as_deref());
                source_ip.append_option(row.source_ip.as_deref());
                user_agent.append_option(row.user_agent.as_deref());
                description.append_value(&row.description);
                outcome.append_value(&row.outcome);
                for tag in &row.tags {
                    tags.values().append_value(tag);
                }
                tags.append(true);
                created_at.append_value(millis(row.created_at));
            }

            vec![
                Arc::new(id.finish()),
                Arc::new(event_type.finish()),
                Arc::new(severity.finish()),
                Arc::new(event_time.finish().with_timezone("UTC")),
                Arc::new(actor_id.finish()),
                Arc::new(impersonator_id.finish()),
                Arc::new(tenant_id.finish()),
                Arc::new(request_id.finish()),
                Arc::new(resource_type.finish()),
                Arc::new(resource_id.finish()),
                Arc::new(source_ip.finish()),
                Arc::new(user_agent.finish()),
                Arc::new(description.finish()),
                Arc::new(outcome.finish()),
                Arc::new(tags.finish()),
                Arc::new(created_at.finish().with_timezone("UTC")),
            ]
        }
        CatalogRows::MonitoredFiles(rows) => {
            let mut id = FixedSizeBinaryBuilder::new(16);
            let mut tenant_id = FixedSizeBinaryBuilder::new(16);
            let mut target_id = FixedSizeBinaryBuilder::new(16);
            let mut file_path = StringBuilder::new();
            let mut registered_at =
                arrow::array::PrimitiveBuilder::<TimestampMillisecondType>::new();

            for row in rows {
                id.append_value(uuid_bytes(row.id))?;
                tenant_id.append_value(uuid_bytes(row.tenant_id))?;
                target_id.append_value(uuid_bytes(row.target_id))?;
                file_path.append_value(&row.file_path);
                registered_at.append_value(millis(row.registered_at));
            }

            vec![
                Arc::new(id.finish()),
                Arc::new(tenant_id.finish()),
                Arc::new(target_id.finish()),
                Arc::new(file_path.finish()),
                Arc::new(registered_at.finish().with_timezone("UTC")),
            ]
        }
        CatalogRows::RemediationActions(rows) => {
            let mut id = FixedSizeBinaryBuilder::new(16);
            let mut tenant_id = FixedSizeBinaryBuilder::new(16);
            let mut scan_result_id = FixedSizeBinaryBuilder::new(16);
            let mut policy_id = StringBuilder::new();
            let mut policy_name = StringBuilder::new();
            let mut framework: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut severity: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut status: StringDictionaryBuilder<Int32Type> = StringDictionaryBuilder::new();
            let mut created_at =
                arrow::array::PrimitiveBuilder::<TimestampMillisecondType>::new();

            for row in rows {
                id.append_value(uuid_bytes(row.id))?;
                tenant_id.append_value(uuid_bytes(row.tenant_id))?;
                match row.scan_result_id {
                    Some(sid) => scan_result_id.append_value(uuid_bytes(sid))?,
                    None => scan_result_id.append_null(),
                }
                policy_id.append_value(&row.policy_id);
                policy_name.append_value(&row.policy_name);
                framework.append_value(&row.framework);
                severity.append_value(&row.severity);
                status.append_value(&row.status);
                created_at.append_value(millis(row.created_at));
            }

            vec![
                Arc::new(id.finish()),
                Arc::new(tenant_id.finish()),
                Arc::new(scan_result_id.finish()),
                Arc::new(policy_id.finish()),
                Arc::new(policy_name.finish()),
                Arc::new(framework.finish()),
                Arc::new(severity.finish()),
                Arc::new(status.finish()),
                Arc::new(created_at.finish().with_timezone("UTC")),
            ]
        }
    };

    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileAccessEventRow;

    #[test]
    fn file_access_events_batch_has_one_row_per_input() {
        let rows = CatalogRows::FileAccessEvents(vec![FileAccessEventRow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            file_path: "/tmp/a.txt".into(),
            action: "write".into(),
            user_name: Some("alice".into()),
            process_name: None,
            event_time: Utc::now(),
            event_source: "fanotify".into(),
        }]);

        let batch = build_record_batch(CatalogTable::FileAccessEvents, &rows).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 8);
    }
}
