//! The unit of detection output (§4.B Stage 1): one candidate sensitive-data
//! occurrence before entity resolution groups it with its siblings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanSource {
    Pattern,
    Secret,
    Ner,
}

/// One candidate occurrence of sensitive data in a text blob.
///
/// `start`/`end` are byte offsets into the chunk the span was detected in,
/// not the original document — callers that need document-absolute offsets
/// add the chunk's own `start` before persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub entity_type: String,
    pub value: String,
    pub confidence: f64,
    pub source: SpanSource,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        entity_type: impl Into<String>,
        value: impl Into<String>,
        confidence: f64,
        source: SpanSource,
    ) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.into(),
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
        }
    }

    /// Two spans overlap when their `[start, end)` ranges intersect.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}
