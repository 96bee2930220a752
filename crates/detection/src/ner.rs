//! Stage 2 ML escalation (§4.B): a trait over NER models rather than a
//! binding to a specific inference crate. Production deployments supply a
//! model implementation (e.g. an ONNX Runtime or Candle-backed PII-BERT /
//! PHI-BERT session); this crate only defines the seam and the escalation
//! trigger, the same way the job queue crate defines `JobExecutor` as a
//! trait the orchestrator implements rather than owning task logic itself.

use crate::chunking::{TextChunk, TextChunker};
use crate::span::{Span, SpanSource};
use openlabels_core::error::Result;
use std::collections::HashSet;
use std::sync::Once;

/// One NER model session, loaded once per worker process and shared
/// read-only across threads (an `Arc<dyn NerModel>` constructed at startup).
pub trait NerModel: Send + Sync {
    fn name(&self) -> &str;

    /// Runs inference over one chunk of text, returning spans with offsets
    /// relative to the chunk (the caller adds `chunk.start` before merging
    /// into document-absolute offsets).
    fn infer(&self, chunk: &str) -> Result<Vec<Span>>;
}

static ML_UNAVAILABLE_WARNING: Once = Once::new();

/// Decides whether Stage 1 output should escalate to NER, per §4.B: any
/// Stage-1 span below the confidence floor in an ML-beneficial type, or a
/// complete absence of NAME-class entities.
pub fn should_escalate(stage1_spans: &[Span]) -> bool {
    const CONFIDENCE_FLOOR: f64 = 0.85;

    let has_low_confidence_beneficial = stage1_spans
        .iter()
        .any(|s| s.confidence < CONFIDENCE_FLOOR && crate::alias::ML_BENEFICIAL_TYPES.contains(s.entity_type.as_str()));

    let has_no_name_class = !stage1_spans.iter().any(|s| s.entity_type.starts_with("NAME"));

    has_low_confidence_beneficial || has_no_name_class
}

/// Runs every configured model over chunked `text` and returns deduped,
/// document-absolute-offset spans. Each chunk is isolated: a model panic or
/// error on one chunk drops that chunk's contribution without failing the
/// whole escalation (§4.B "Failure semantics").
pub fn escalate(models: &[std::sync::Arc<dyn NerModel>], text: &str, chunker: &TextChunker) -> Vec<Span> {
    if models.is_empty() {
        ML_UNAVAILABLE_WARNING.call_once(|| {
            tracing::warn!("NER escalation requested but no model is configured; Stage 2 will be skipped for this process");
        });
        return Vec::new();
    }

    let chunks = chunker.chunk(text);
    let mut spans = Vec::new();

    for chunk in &chunks {
        for model in models {
            match model.infer(&chunk.text) {
                Ok(chunk_spans) => spans.extend(offset_spans(chunk_spans, chunk)),
                Err(e) => {
                    tracing::warn!(model = model.name(), chunk_index = chunk.chunk_index, error = %e, "NER inference failed for chunk, skipping");
                }
            }
        }
    }

    dedupe_at_boundaries(spans)
}

fn offset_spans(spans: Vec<Span>, chunk: &TextChunk) -> Vec<Span> {
    spans
        .into_iter()
        .map(|mut s| {
            s.start += chunk.start;
            s.end += chunk.start;
            s.source = SpanSource::Ner;
            s
        })
        .collect()
}

/// Dedupes spans produced independently by overlapping chunks, keyed by
/// `(start, end, type)` as called out in §4.B.
fn dedupe_at_boundaries(spans: Vec<Span>) -> Vec<Span> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(spans.len());

    for span in spans {
        let key = (span.start, span.end, span.entity_type.clone());
        if seen.insert(key) {
            deduped.push(span);
        }
    }

    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct StubModel;
    impl NerModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }
        fn infer(&self, chunk: &str) -> Result<Vec<Span>> {
            if chunk.contains("Jane Doe") {
                Ok(vec![Span::new(0, 8, "NAME", "Jane Doe", 0.93, SpanSource::Ner)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn escalates_when_no_name_class_spans_exist() {
        let stage1 = vec![Span::new(0, 5, "EMAIL", "a@b.c", 0.9, SpanSource::Pattern)];
        assert!(should_escalate(&stage1));
    }

    #[test]
    fn does_not_escalate_when_name_present_with_high_confidence() {
        let stage1 = vec![Span::new(0, 5, "NAME", "Jane", 0.95, SpanSource::Pattern)];
        assert!(!should_escalate(&stage1));
    }

    #[test]
    fn empty_model_list_returns_no_spans_and_warns_once() {
        let chunker = TextChunker::default();
        let spans = escalate(&[], "Jane Doe visited", &chunker);
        assert!(spans.is_empty());
    }

    #[test]
    fn model_offsets_are_translated_to_document_absolute() {
        let chunker = TextChunker::default();
        let models: Vec<Arc<dyn NerModel>> = vec![Arc::new(StubModel)];
        let spans = escalate(&models, "prefix text then Jane Doe appears", &chunker);
        assert!(spans.iter().any(|s| s.entity_type == "NAME"));
    }
}
