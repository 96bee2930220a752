//! Drives the three escalating detection stages over one file's extracted
//! text (§4.B) and produces resolved entities ready for the risk scorer.

use crate::chunking::TextChunker;
use crate::context;
use crate::entity::{self, Entity};
use crate::ner::{self, NerModel};
use crate::patterns;
use crate::secrets;
use crate::span::Span;
use std::collections::HashMap;
use std::sync::Arc;

pub struct DetectionResult {
    pub entities: Vec<Entity>,
    pub entity_counts: HashMap<String, u32>,
}

pub struct DetectionPipeline {
    ner_models: Vec<Arc<dyn NerModel>>,
    chunker: TextChunker,
}

impl DetectionPipeline {
    pub fn new(ner_models: Vec<Arc<dyn NerModel>>) -> Self {
        Self {
            ner_models,
            chunker: TextChunker::default(),
        }
    }

    /// Runs the full pipeline over `text` extracted from a file identified
    /// by `file_hash` (used only for log correlation here; chunk-level
    /// restart bookkeeping is the caller's responsibility via
    /// `chunking::TextChunker`).
    pub fn detect(&self, file_hash: &str, text: &str) -> DetectionResult {
        let stage1 = self.run_stage1(file_hash, text);

        let stage2 = if ner::should_escalate(&stage1) {
            ner::escalate(&self.ner_models, text, &self.chunker)
        } else {
            Vec::new()
        };

        let mut combined = stage1;
        combined.extend(stage2);
        let combined = patterns::merge_overlapping(combined);

        let stage3 = context::apply_context(combined, text);

        let entities = entity::resolve_entities(&stage3);
        let counts = entity::entity_counts(&entities);

        DetectionResult {
            entities,
            entity_counts: counts,
        }
    }

    /// Both detector families are infallible pure functions; chunk-level
    /// failure isolation (§4.B "Failure semantics") lives in
    /// `ner::escalate`, which is the only Stage that calls out to a
    /// pluggable, possibly-fallible model, and in the orchestrator's
    /// per-file isolation one layer up.
    fn run_stage1(&self, file_hash: &str, text: &str) -> Vec<Span> {
        tracing::trace!(file_hash, "running stage 1 pattern and secret detectors");
        let mut combined = patterns::run_patterns(text);
        combined.extend(secrets::run_secrets(text));
        patterns::merge_overlapping(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_detects_an_ssn_and_resolves_to_one_entity() {
        let pipeline = DetectionPipeline::new(Vec::new());
        let result = pipeline.detect("abc123", "Patient SSN: 123-45-6789 on file for admission");
        assert_eq!(result.entity_counts.get("SSN"), Some(&1));
    }

    #[test]
    fn clean_text_produces_no_entities() {
        let pipeline = DetectionPipeline::new(Vec::new());
        let result = pipeline.detect("abc123", "the weather today is quite pleasant and sunny");
        assert!(result.entities.is_empty());
    }
}
