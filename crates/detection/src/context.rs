//! Stage 3 context enhancement (§4.B): examines the text surrounding each
//! surviving span and adjusts confidence before the final confidence-floor
//! cut. Grounded on the source's dedicated prose-detection heuristic, kept
//! to its core signals rather than the full regex bank it accumulated.

use crate::span::Span;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters of surrounding text examined on each side of a span.
const CONTEXT_WINDOW: usize = 64;

const CONFIDENCE_FLOOR: f64 = 0.5;

static DENY_LIST: &[&str] = &[
    "<html>", "<body>", "<div>", "<span>", "n/a", "none", "null", "unknown", "acme corp", "example corp",
];

static NEGATIVE_HOTWORDS: &[&str] = &["test", "example", "sample", "dummy", "n/a", "placeholder"];

static POSITIVE_HOTWORDS: &[&str] = &["patient", "dob", "ssn:", "diagnosis", "prescri", "member id", "account #"];

static PROSE_AUX_VERBS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(was|were|is|are|has|have|had|will|would|could|should|been|being)\b").unwrap());

static PROSE_PRONOUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s(he|she|they|his|her|their|him|them|it|its)\s").unwrap());

static PROSE_SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s+[A-Z]").unwrap());

/// A span's value is prose, not a field value, when it is long and either
/// reads like a sentence or carries pronoun/auxiliary-verb flow (§4.B
/// "Prose detection").
pub fn looks_like_prose(value: &str) -> bool {
    if value.len() < 3 {
        return false;
    }
    if value.len() > 60 {
        return true;
    }
    if PROSE_SENTENCE_BREAK.is_match(value) {
        return true;
    }
    if value.contains('|') {
        return true;
    }
    if PROSE_PRONOUNS.is_match(value) {
        return true;
    }
    if PROSE_AUX_VERBS.is_match(value) {
        return true;
    }

    let words: Vec<&str> = value.split_whitespace().collect();
    if words.len() >= 3 {
        let lowercase_count = words[1..]
            .iter()
            .filter(|w| w.chars().next().is_some_and(|c| c.is_lowercase()) && !matches!(**w, "and" | "or" | "of" | "the"))
            .count();
        if lowercase_count >= 2 {
            return true;
        }
    }

    false
}

fn surrounding_window(text: &str, start: usize, end: usize) -> String {
    let window_start = start.saturating_sub(CONTEXT_WINDOW);
    let window_end = (end + CONTEXT_WINDOW).min(text.len());
    text.get(window_start..window_end).unwrap_or("").to_lowercase()
}

/// Applies deny-lists, hotword weighting, and prose rejection to every span,
/// dropping those that fail, and returns the survivors with adjusted
/// confidence (§4.B Stage 3).
pub fn apply_context(spans: Vec<Span>, full_text: &str) -> Vec<Span> {
    spans
        .into_iter()
        .filter_map(|mut span| {
            let value_lower = span.value.to_lowercase();
            if DENY_LIST.iter().any(|d| value_lower.contains(d)) {
                return None;
            }

            if looks_like_prose(&span.value) {
                return None;
            }

            let window = surrounding_window(full_text, span.start, span.end);

            if NEGATIVE_HOTWORDS.iter().any(|h| window.contains(h)) {
                span.confidence *= 0.5;
            }
            if POSITIVE_HOTWORDS.iter().any(|h| window.contains(h)) {
                span.confidence = (span.confidence * 1.2).min(1.0);
            }

            if span.confidence < CONFIDENCE_FLOOR && !crate::alias::HIGH_VALUE_ALWAYS_KEEP.contains(span.entity_type.as_str()) {
                return None;
            }

            Some(span)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SpanSource;

    #[test]
    fn prose_sentence_is_rejected() {
        assert!(looks_like_prose("Patient reports feeling much better today and was discharged"));
    }

    #[test]
    fn short_structured_value_is_not_prose() {
        assert!(!looks_like_prose("123-45-6789"));
    }

    #[test]
    fn deny_listed_value_is_dropped() {
        let spans = vec![Span::new(0, 5, "EMPLOYER", "N/A", 0.9, SpanSource::Pattern)];
        let result = apply_context(spans, "company: N/A for this record");
        assert!(result.is_empty());
    }

    #[test]
    fn positive_hotword_boosts_confidence() {
        let text = "patient ssn: 123-45-6789 on file";
        let start = text.find("123-45-6789").unwrap();
        let spans = vec![Span::new(start, start + 11, "SSN", "123-45-6789", 0.7, SpanSource::Pattern)];
        let result = apply_context(spans, text);
        assert_eq!(result.len(), 1);
        assert!(result[0].confidence > 0.7);
    }

    #[test]
    fn negative_hotword_can_drop_a_low_confidence_span() {
        let text = "this is just a test example value 12345 here";
        let start = text.find("12345").unwrap();
        let spans = vec![Span::new(start, start + 5, "PASSPORT", "12345", 0.4, SpanSource::Pattern)];
        let result = apply_context(spans, text);
        assert!(result.is_empty());
    }

    #[test]
    fn high_value_type_survives_low_confidence() {
        let spans = vec![Span::new(0, 3, "SSN", "xxx", 0.1, SpanSource::Pattern)];
        let result = apply_context(spans, "xxx in the middle of unrelated text");
        assert_eq!(result.len(), 1);
    }
}
