//! Query classification
//!
//! Reference-code detection runs against the RAW query, before any
//! normalization: codes carry their meaning in the exact characters the
//! user typed. Position/side detection runs on normalized text that
//! preserves short tokens ("av", "ar", "g", "d") — abbreviations are
//! meaningful for position but would be noise for synonym matching.

use crate::synonyms::SynonymIndex;
use partsbot_common::text::{contains_phrase, long_tokens, normalize};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Vehicle models recognized in queries and designations
const KNOWN_MODELS: &[&str] = &[
    "swift", "alto", "celerio", "jimny", "vitara", "baleno", "ignis", "ertiga", "sx4", "splash",
];

/// Detect a vehicle model mention inside normalized text
pub fn detect_model(normalized: &str) -> Option<String> {
    KNOWN_MODELS
        .iter()
        .find(|m| contains_phrase(normalized, m))
        .map(|m| m.to_string())
}

/// Position/side requirements extracted from a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRequirements {
    pub front: bool,
    pub rear: bool,
    pub left: bool,
    pub right: bool,
}

impl PositionRequirements {
    /// Any dimension requested
    pub fn any(&self) -> bool {
        self.front || self.rear || self.left || self.right
    }

    /// Front/rear axis specified
    pub fn position_specified(&self) -> bool {
        self.front || self.rear
    }

    /// Left/right axis specified
    pub fn side_specified(&self) -> bool {
        self.left || self.right
    }

    /// Merge in an answer: an axis stated by `answer` overrides the same
    /// axis here, other axes are kept.
    pub fn merged_with(&self, answer: PositionRequirements) -> PositionRequirements {
        let mut out = *self;
        if answer.position_specified() {
            out.front = answer.front;
            out.rear = answer.rear;
        }
        if answer.side_specified() {
            out.left = answer.left;
            out.right = answer.right;
        }
        out
    }

    /// Qualifier words for rebuilding a searchable string
    pub fn qualifier_words(&self) -> Vec<&'static str> {
        let mut words = Vec::new();
        if self.front {
            words.push("avant");
        }
        if self.rear {
            words.push("arriere");
        }
        if self.left {
            words.push("gauche");
        }
        if self.right {
            words.push("droite");
        }
        words
    }
}

/// Paired position/side regexes over normalized text.
///
/// Each pattern recognizes the word standalone or adjacent to its
/// counterpart ("avant gauche", "gauche avant"), including the short
/// designation abbreviations.
pub struct PositionPatterns {
    front: Regex,
    rear: Regex,
    left: Regex,
    right: Regex,
}

impl Default for PositionPatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionPatterns {
    pub fn new() -> Self {
        Self {
            front: Regex::new(r"\b(?:avant|av)\b(?:\s+(?:gauche|droite|droit|g|d)\b)?").unwrap(),
            rear: Regex::new(r"\b(?:arriere|ar)\b(?:\s+(?:gauche|droite|droit|g|d)\b)?").unwrap(),
            left: Regex::new(r"\b(?:gauche|g)\b(?:\s+(?:avant|arriere|av|ar)\b)?").unwrap(),
            right: Regex::new(r"\b(?:droite|droit|d)\b(?:\s+(?:avant|arriere|av|ar)\b)?").unwrap(),
        }
    }

    /// Detect position/side markers in normalized text
    pub fn detect(&self, normalized: &str) -> PositionRequirements {
        PositionRequirements {
            front: self.front.is_match(normalized),
            rear: self.rear.is_match(normalized),
            left: self.left.is_match(normalized),
            right: self.right.is_match(normalized),
        }
    }
}

/// Bare position/side words eligible for the relaxed score threshold
const BARE_POSITION_WORDS: &[&str] = &[
    "avant", "av", "arriere", "ar", "gauche", "g", "droite", "droit", "d",
];

/// Parsed query context, built fresh per search call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchContext {
    /// Original query text as received
    pub original_query: String,

    /// Canonicalized query text
    pub normalized_query: String,

    /// Length-filtered tokens (>2 chars), in query order
    pub tokens: Vec<String>,

    /// Synonym-enriched term set, deduplicated, insertion-ordered
    pub expanded_terms: Vec<String>,

    /// Position/side requirements
    pub position: PositionRequirements,

    /// Detected main part type (synonym category key)
    pub main_type: Option<String>,

    /// Detected vehicle model
    pub model: Option<String>,

    /// Query is a single bare position/side word
    pub bare_position: bool,

    /// Dialect rewrite was applied upstream
    pub dialect_detected: bool,
}

/// Query classifier: reference codes, position/side, model, part type
pub struct QueryClassifier {
    synonyms: Arc<SynonymIndex>,
    positions: PositionPatterns,
    // Ordered most-specific-first; see detect_reference
    whole_code: Regex,
    whole_prefixed: Regex,
    embedded_code: Regex,
    embedded_prefixed: Regex,
    reference_phrase: Regex,
}

impl QueryClassifier {
    pub fn new(synonyms: Arc<SynonymIndex>) -> Self {
        Self {
            synonyms,
            positions: PositionPatterns::new(),
            whole_code: Regex::new(r"^[A-Za-z0-9]{8,}$").unwrap(),
            whole_prefixed: Regex::new(r"^[A-Za-z]{2}-?[0-9][A-Za-z0-9-]{4,}$").unwrap(),
            embedded_code: Regex::new(r"\b([A-Za-z0-9]{8,})\b").unwrap(),
            embedded_prefixed: Regex::new(r"\b([A-Za-z]{2}-?[0-9][A-Za-z0-9-]{4,})\b").unwrap(),
            reference_phrase: Regex::new(r"(?i)r[eé]f[eé]rence\s*:?\s*([A-Za-z0-9-]{6,})").unwrap(),
        }
    }

    /// Detect a reference code in the RAW query. The first pattern whose
    /// capture contains both a letter and a digit and is ≥8 characters
    /// wins; order goes from most to least specific.
    pub fn detect_reference(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();

        if let Some(m) = self.whole_code.find(trimmed) {
            if is_reference_shaped(m.as_str()) {
                return Some(m.as_str().to_string());
            }
        }

        if let Some(m) = self.whole_prefixed.find(trimmed) {
            if is_reference_shaped(m.as_str()) {
                return Some(m.as_str().to_string());
            }
        }

        for re in [&self.embedded_code, &self.embedded_prefixed] {
            for caps in re.captures_iter(trimmed) {
                let code = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                if is_reference_shaped(code) {
                    return Some(code.to_string());
                }
            }
        }

        if let Some(caps) = self.reference_phrase.captures(trimmed) {
            let code = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if is_reference_shaped(code) {
                return Some(code.to_string());
            }
        }

        None
    }

    /// Build the search context for a free-text query.
    ///
    /// `query` is the effective text (dialect rewrite already applied by
    /// the caller when one happened).
    pub fn classify(&self, query: &str, dialect_detected: bool) -> SearchContext {
        let normalized = normalize(query);
        let tokens = long_tokens(&normalized);

        // Synonym expansion over length-filtered tokens only
        let mut expanded_terms: Vec<String> = Vec::new();
        for token in &tokens {
            push_unique(&mut expanded_terms, token.clone());
            for extra in self.synonyms.expand(token) {
                push_unique(&mut expanded_terms, extra);
            }
        }

        // Position detection keeps short tokens: it runs on the full
        // normalized string, not the filtered token set
        let position = self.positions.detect(&normalized);

        let main_type = self.detect_main_type(&normalized, &tokens);
        let model = detect_model(&normalized);

        let all: Vec<&str> = normalized.split_whitespace().collect();
        let bare_position = all.len() == 1 && BARE_POSITION_WORDS.contains(&all[0]);

        SearchContext {
            original_query: query.to_string(),
            normalized_query: normalized,
            tokens,
            expanded_terms,
            position,
            main_type,
            model,
            bare_position,
            dialect_detected,
        }
    }

    /// First token that resolves to a synonym category wins, except that
    /// a brake-pad mention always wins over generic "frein".
    fn detect_main_type(&self, normalized: &str, tokens: &[String]) -> Option<String> {
        if contains_phrase(normalized, "plaquette") || contains_phrase(normalized, "plaquettes") {
            return Some("plaquette".to_string());
        }

        tokens
            .iter()
            .find_map(|t| self.synonyms.category_of(t))
            .map(|c| c.to_string())
    }

    /// Access the shared position patterns
    pub fn positions(&self) -> &PositionPatterns {
        &self.positions
    }
}

fn is_reference_shaped(code: &str) -> bool {
    code.len() >= 8
        && code.chars().any(|c| c.is_ascii_alphabetic())
        && code.chars().any(|c| c.is_ascii_digit())
}

fn push_unique(terms: &mut Vec<String>, term: String) {
    if !terms.contains(&term) {
        terms.push(term);
    }
}
