//! Drives one page of enumerated files through read → detect → score →
//! policy → persist, under the back-pressure and concurrency caps (§4.F).
//! Shared by both single-partition mode and fan-out partition workers so the
//! two modes can never drift in per-file semantics.

use crate::backpressure::Backpressure;
use crate::repository::ScanRepository;
use crate::types::{NewScanResult, ScanTotals};
use futures::stream::{self, StreamExt};
use openlabels_adapters::{Adapter, FileInfo};
use openlabels_core::error::Result;
use openlabels_detection::DetectionPipeline;
use openlabels_scoring::{policy, scorer, EntityObservation, Policy};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Reads, detects, scores, and policy-evaluates one file, producing the row
/// to persist. A per-file failure becomes a `scan_error` on the row rather
/// than propagating — §4.F "Per-file errors ... do not fail the job."
pub async fn process_one_file(
    adapter: &dyn Adapter,
    pipeline: &DetectionPipeline,
    policies: &[Policy],
    file: &FileInfo,
) -> NewScanResult {
    let outcome = async {
        let bytes = adapter.read(file).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let content_hash = format!("{:x}", md5_like_hash(&bytes));
        let detection = pipeline.detect(&content_hash, &text);

        let mut observations: HashMap<String, EntityObservation> = HashMap::new();
        for entity in &detection.entities {
            let obs = observations
                .entry(entity.entity_type.clone())
                .or_insert(EntityObservation { count: 0, max_confidence: 0.0 });
            obs.count += 1;
            obs.max_confidence = obs.max_confidence.max(entity.max_confidence);
        }

        let risk_score = scorer::score(&detection.entity_counts, file.exposure_level);
        let policy_result = policy::evaluate(policies, &observations);

        Result::<_, openlabels_core::error::Error>::Ok((content_hash, detection.entity_counts, risk_score, policy_result))
    }
    .await;

    match outcome {
        Ok((content_hash, entity_counts, risk_score, policy_result)) => NewScanResult {
            file_path: file.path.clone(),
            file_name: file.name.clone(),
            file_size: file.size as i64,
            content_hash: Some(content_hash),
            risk_score: risk_score as i16,
            risk_tier: risk_tier_str(scorer::RiskTier::from_score(risk_score)).to_string(),
            entity_counts: serde_json::to_value(&entity_counts).unwrap_or_default(),
            exposure_level: exposure_level_str(file.exposure_level),
            policy_violations: serde_json::to_value(&policy_result.matched).unwrap_or_default(),
            scan_error: None,
        },
        Err(err) => {
            warn!(file_path = %file.path, error = %err, "file scan failed, recording scan_error");
            NewScanResult {
                file_path: file.path.clone(),
                file_name: file.name.clone(),
                file_size: file.size as i64,
                content_hash: None,
                risk_score: 0,
                risk_tier: "MINIMAL".to_string(),
                entity_counts: serde_json::json!({}),
                exposure_level: exposure_level_str(file.exposure_level),
                policy_violations: serde_json::json!([]),
                scan_error: Some(err.to_string()),
            }
        }
    }
}

fn exposure_level_str(level: openlabels_core::types::ExposureLevel) -> String {
    use openlabels_core::types::ExposureLevel::*;
    match level {
        Private => "PRIVATE",
        Internal => "INTERNAL",
        OrgWide => "ORG_WIDE",
        Public => "PUBLIC",
    }
    .to_string()
}

/// Cheap, dependency-free content fingerprint for `content_hash` — not
/// cryptographic, only used for dedup/debug correlation the way the
/// detection pipeline keys its chunk-resume state.
fn md5_like_hash(bytes: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn risk_tier_str(tier: scorer::RiskTier) -> &'static str {
    match tier {
        scorer::RiskTier::Minimal => "MINIMAL",
        scorer::RiskTier::Low => "LOW",
        scorer::RiskTier::Medium => "MEDIUM",
        scorer::RiskTier::High => "HIGH",
        scorer::RiskTier::Critical => "CRITICAL",
    }
}

/// Processes one enumerated page under the concurrency and memory caps,
/// persisting each file's result as it completes and returning the totals
/// accumulated over the page.
#[allow(clippy::too_many_arguments)]
pub async fn process_page(
    files: &[FileInfo],
    adapter: &Arc<dyn Adapter>,
    pipeline: &Arc<DetectionPipeline>,
    policies: &Arc<Vec<Policy>>,
    repo: &Arc<ScanRepository>,
    tenant_id: Uuid,
    job_id: Uuid,
    backpressure: &Arc<Backpressure>,
    max_concurrent_files: usize,
) -> Result<ScanTotals> {
    let results: Vec<(FileInfo, NewScanResult)> = stream::iter(files.iter().cloned())
        .map(|file| {
            let adapter = Arc::clone(adapter);
            let pipeline = Arc::clone(pipeline);
            let policies = Arc::clone(policies);
            let backpressure = Arc::clone(backpressure);
            async move {
                let _guard = backpressure.acquire(file.size).await;
                let result = process_one_file(adapter.as_ref(), &pipeline, &policies, &file).await;
                (file, result)
            }
        })
        .buffer_unordered(max_concurrent_files.max(1))
        .collect()
        .await;

    let mut totals = ScanTotals::default();
    for (file, result) in &results {
        repo.insert_scan_result(tenant_id, job_id, result).await?;
        totals.files_scanned += 1;
        if !result.entity_counts.as_object().map(|m| m.is_empty()).unwrap_or(true) {
            totals.files_with_pii += 1;
        }
        if let Some(counts) = result.entity_counts.as_object() {
            for value in counts.values() {
                totals.total_entities += value.as_u64().unwrap_or(0);
            }
        }
        totals.last_processed_path = Some(file.path.clone());
    }

    debug!(job_id = %job_id, files = results.len(), "processed page");
    Ok(totals)
}
