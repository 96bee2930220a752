//! Stage 1 pattern/regex detectors (§4.B): each entry pairs a regex with an
//! optional structural validator and a base confidence. Grounded on the
//! built-in pattern table the source ships as its Python-fallback detector
//! list, carried over here as the sole (not a fallback) implementation.

use crate::span::{Span, SpanSource};
use crate::validators;
use once_cell::sync::Lazy;
use regex::Regex;

type Validator = fn(&str) -> bool;

struct PatternDef {
    entity_type: &'static str,
    regex: &'static str,
    validator: Option<Validator>,
    base_confidence: f64,
}

static BUILTIN_PATTERNS: &[PatternDef] = &[
    // Financial
    PatternDef {
        entity_type: "CREDIT_CARD",
        regex: r"\b4[0-9]{12}(?:[0-9]{3})?\b",
        validator: Some(validators::luhn_check),
        base_confidence: 0.80,
    },
    PatternDef {
        entity_type: "CREDIT_CARD",
        regex: r"\b(?:5[1-5][0-9]{2}|222[1-9]|22[3-9][0-9]|2[3-6][0-9]{2}|27[01][0-9]|2720)[0-9]{12}\b",
        validator: Some(validators::luhn_check),
        base_confidence: 0.80,
    },
    PatternDef {
        entity_type: "CREDIT_CARD",
        regex: r"\b3[47][0-9]{13}\b",
        validator: Some(validators::luhn_check),
        base_confidence: 0.80,
    },
    PatternDef {
        entity_type: "CREDIT_CARD",
        regex: r"\b6(?:011|5[0-9]{2})[0-9]{12}\b",
        validator: Some(validators::luhn_check),
        base_confidence: 0.80,
    },
    PatternDef {
        entity_type: "CREDIT_CARD",
        regex: r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
        validator: Some(validators::luhn_check),
        base_confidence: 0.75,
    },
    PatternDef {
        entity_type: "IBAN",
        regex: r"\b[A-Z]{2}[0-9]{2}[A-Z0-9]{4}[0-9]{7}(?:[A-Z0-9]{0,16})?\b",
        validator: Some(validators::validate_iban),
        base_confidence: 0.85,
    },
    PatternDef {
        entity_type: "ABA_ROUTING",
        regex: r"\b(?:0[1-9]|1[0-2]|2[1-9]|3[0-2]|6[1-9]|7[0-2]|80)[0-9]{7}\b",
        validator: Some(validators::validate_aba_routing),
        base_confidence: 0.60,
    },
    // Personal identifiers
    PatternDef {
        entity_type: "SSN",
        regex: r"\b(?:000|666|9\d{2})?\d{3}[-\s]?\d{2}[-\s]?\d{4}\b",
        validator: Some(validators::validate_ssn),
        base_confidence: 0.85,
    },
    PatternDef {
        entity_type: "NPI",
        regex: r"\b[12][0-9]{9}\b",
        validator: Some(validators::validate_npi),
        base_confidence: 0.80,
    },
    PatternDef {
        entity_type: "DRIVER_LICENSE",
        regex: r"\b[A-Z][0-9]{7}\b",
        validator: None,
        base_confidence: 0.50,
    },
    PatternDef {
        entity_type: "PASSPORT",
        regex: r"\b[0-9]{9}\b",
        validator: None,
        base_confidence: 0.40,
    },
    // Contact
    PatternDef {
        entity_type: "EMAIL",
        regex: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        validator: None,
        base_confidence: 0.90,
    },
    PatternDef {
        entity_type: "PHONE",
        regex: r"\b(?:\+1[-.\s]?)?\(?[2-9][0-9]{2}\)?[-.\s]?[2-9][0-9]{2}[-.\s]?[0-9]{4}\b",
        validator: None,
        base_confidence: 0.75,
    },
    PatternDef {
        entity_type: "PHONE",
        regex: r"\b\+[1-9][0-9]{6,14}\b",
        validator: None,
        base_confidence: 0.70,
    },
    // Network
    PatternDef {
        entity_type: "IP_ADDRESS",
        regex: r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
        validator: None,
        base_confidence: 0.85,
    },
    PatternDef {
        entity_type: "MAC_ADDRESS",
        regex: r"\b(?:[0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}\b",
        validator: None,
        base_confidence: 0.80,
    },
    // Healthcare
    PatternDef {
        entity_type: "MRN",
        regex: r"\b(?:MRN|mrn)[:\s#]*[0-9]{6,12}\b",
        validator: None,
        base_confidence: 0.80,
    },
    PatternDef {
        entity_type: "DATE_DOB",
        regex: r"(?i)(?:dob|date\s*of\s*birth|birth\s*date)[:\s]*\d{1,2}[-/]\d{1,2}[-/]\d{2,4}",
        validator: None,
        base_confidence: 0.85,
    },
    // Government
    PatternDef {
        entity_type: "CLASSIFICATION_MARKING",
        regex: r"(?i)\b(?:TOP\s*SECRET|SECRET|CONFIDENTIAL|UNCLASSIFIED|FOUO|NOFORN|ORCON|REL\s*TO)\b",
        validator: None,
        base_confidence: 0.95,
    },
];

static COMPILED: Lazy<Vec<(&'static PatternDef, Regex)>> = Lazy::new(|| {
    BUILTIN_PATTERNS
        .iter()
        .map(|def| {
            let regex = Regex::new(def.regex).unwrap_or_else(|e| panic!("invalid builtin pattern '{}': {e}", def.entity_type));
            (def, regex)
        })
        .collect()
});

/// Runs every built-in pattern detector over `text`, validating matches
/// where a structural validator exists and dropping those that fail it.
pub fn run_patterns(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();

    for (def, regex) in COMPILED.iter() {
        for m in regex.find_iter(text) {
            let value = m.as_str();

            let confidence = match def.validator {
                Some(validate) => {
                    if !validate(value) {
                        continue;
                    }
                    def.base_confidence
                }
                None => def.base_confidence,
            };

            spans.push(Span::new(m.start(), m.end(), def.entity_type, value, confidence, SpanSource::Pattern));
        }
    }

    spans
}

/// Merges overlapping spans of compatible types, keeping the
/// highest-confidence survivor (§4.B Stage 1 "merge overlapping spans").
pub fn merge_overlapping(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by_key(|s| s.start);

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = merged.last_mut() {
            if last.overlaps(&span) && crate::alias::types_compatible(&last.entity_type, &span.entity_type) {
                if span.confidence > last.confidence {
                    *last = span;
                }
                continue;
            }
        }
        merged.push(span);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_email_addresses() {
        let spans = run_patterns("contact me at alice@example.com please");
        assert!(spans.iter().any(|s| s.entity_type == "EMAIL" && s.value == "alice@example.com"));
    }

    #[test]
    fn rejects_a_card_number_that_fails_luhn() {
        let spans = run_patterns("card 4532015112830367 on file");
        assert!(!spans.iter().any(|s| s.entity_type == "CREDIT_CARD"));
    }

    #[test]
    fn accepts_a_card_number_that_passes_luhn() {
        let spans = run_patterns("card 4532015112830366 on file");
        assert!(spans.iter().any(|s| s.entity_type == "CREDIT_CARD"));
    }

    #[test]
    fn merge_keeps_the_higher_confidence_overlap() {
        let spans = vec![
            Span::new(0, 10, "NAME", "John Smith", 0.6, SpanSource::Pattern),
            Span::new(0, 10, "NAME_PATIENT", "John Smith", 0.9, SpanSource::Ner),
        ];
        let merged = merge_overlapping(spans);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 0.9);
    }
}
