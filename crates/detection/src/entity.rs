//! Entity resolution (§4.B): groups surviving spans into entities by
//! normalized type and normalized value, preserving mention positions for
//! evidence retrieval later in the pipeline.

use crate::alias::normalize_type;
use crate::span::Span;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub entity_type: String,
    pub normalized_value: String,
    pub mentions: Vec<Mention>,
    pub max_confidence: f64,
}

fn normalize_value(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

/// Groups spans into entities keyed by `(normalized_type, normalized_value)`.
pub fn resolve_entities(spans: &[Span]) -> Vec<Entity> {
    let mut groups: HashMap<(String, String), Entity> = HashMap::new();

    for span in spans {
        let entity_type = normalize_type(&span.entity_type).to_string();
        let normalized_value = normalize_value(&span.value);
        let key = (entity_type.clone(), normalized_value.clone());

        let entry = groups.entry(key).or_insert_with(|| Entity {
            entity_type,
            normalized_value,
            mentions: Vec::new(),
            max_confidence: 0.0,
        });

        entry.mentions.push(Mention { start: span.start, end: span.end });
        entry.max_confidence = entry.max_confidence.max(span.confidence);
    }

    groups.into_values().collect()
}

/// Counts entities by normalized type, the shape the risk scorer consumes.
pub fn entity_counts(entities: &[Entity]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for entity in entities {
        *counts.entry(entity.entity_type.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SpanSource;

    #[test]
    fn repeated_mentions_of_the_same_value_group_into_one_entity() {
        let spans = vec![
            Span::new(0, 11, "SSN", "123-45-6789", 0.8, SpanSource::Pattern),
            Span::new(50, 61, "SSN", "123 45 6789", 0.75, SpanSource::Pattern),
        ];
        let entities = resolve_entities(&spans);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].mentions.len(), 2);
        assert_eq!(entities[0].max_confidence, 0.8);
    }

    #[test]
    fn distinct_values_stay_separate_entities() {
        let spans = vec![
            Span::new(0, 5, "EMAIL", "a@b.com", 0.9, SpanSource::Pattern),
            Span::new(20, 25, "EMAIL", "c@d.com", 0.9, SpanSource::Pattern),
        ];
        let entities = resolve_entities(&spans);
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn entity_counts_matches_the_scorer_input_shape() {
        let spans = vec![
            Span::new(0, 5, "NAME", "Jane Doe", 0.9, SpanSource::Pattern),
            Span::new(20, 25, "NAME", "John Smith", 0.9, SpanSource::Pattern),
        ];
        let counts = entity_counts(&resolve_entities(&spans));
        assert_eq!(counts.get("NAME"), Some(&2));
    }
}
