//! Additive relevance scoring
//!
//! Every candidate gets the sum of four independently-computed
//! components (reference, content, position, business signals). Totals
//! may be negative; ordering happens before thresholding so negative
//! scores still rank relatively.
//!
//! All constants live in [`ScoreWeights`] so the ranking policy stays
//! auditable and testable in isolation from token parsing.

use crate::query::{PositionPatterns, SearchContext};
use crate::synonyms::SynonymIndex;
use partsbot_common::models::Part;
use partsbot_common::text::{contains_phrase, contains_word, normalize};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The ranking policy, as one named table
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Reference equal to the normalized query
    pub exact_reference: i64,
    /// Reference contains the normalized query
    pub partial_reference: i64,

    /// Word-boundary designation match, per query token ≥3 chars
    pub token_word_match: i64,
    /// Designation contains any synonym variant of the main part type
    pub type_variant_match: i64,
    /// Main part type detected but absent from the designation
    pub wrong_type_penalty: i64,
    /// Designation exactly equals the part type
    pub exact_designation: i64,
    /// Designation starts with the part type and is not an accessory
    pub type_prefix: i64,
    /// Word-boundary part-type match, not an accessory
    pub type_word: i64,
    /// Accessory carrying the part-type word
    pub accessory_penalty: i64,
    /// Reference contains the normalized query (content tier)
    pub reference_contains_bonus: i64,
    /// Reference equals the normalized query (content tier)
    pub reference_equals_bonus: i64,
    /// Every query token present in designation or reference
    pub all_tokens_bonus: i64,
    /// Base for the per-category co-occurrence bonus, scaled by the
    /// category weight table
    pub type_cooccurrence_base: i64,

    /// Declared position/side present in the designation, per dimension
    pub position_match: i64,
    /// Declared position/side contradicted by the designation, per dimension
    pub position_conflict: i64,

    /// Part is in stock
    pub in_stock: i64,
    /// Query mentions a model present in the designation
    pub model_match: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            exact_reference: 1000,
            partial_reference: 400,
            token_word_match: 1000,
            type_variant_match: 2500,
            wrong_type_penalty: -4000,
            exact_designation: 5000,
            type_prefix: 3000,
            type_word: 2000,
            accessory_penalty: -3500,
            reference_contains_bonus: 200,
            reference_equals_bonus: 400,
            all_tokens_bonus: 150,
            type_cooccurrence_base: 100,
            position_match: 300,
            position_conflict: -500,
            in_stock: 8,
            model_match: 50,
        }
    }
}

/// A scored candidate, ephemeral per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPart {
    pub part: Part,
    pub score: i64,
}

/// Accessory-indicator words: a designation matching these is hardware
/// around the part, not the part itself
const ACCESSORY_PATTERN: &str =
    r"\b(support|sangle|cable|clip|vis|agrafe|fixation|joint|capuchon|ecrou|boulon|patte|soufflet)\b";

/// Relevance scorer
pub struct Scorer {
    weights: ScoreWeights,
    synonyms: Arc<SynonymIndex>,
    positions: PositionPatterns,
    accessory: Regex,
}

impl Scorer {
    pub fn new(weights: ScoreWeights, synonyms: Arc<SynonymIndex>) -> Self {
        Self {
            weights,
            synonyms,
            positions: PositionPatterns::new(),
            accessory: Regex::new(ACCESSORY_PATTERN).unwrap(),
        }
    }

    /// Access the active weight table
    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Score one candidate against the parsed query context
    pub fn score(&self, part: &Part, ctx: &SearchContext) -> i64 {
        let designation = normalize(&part.designation);
        let reference = normalize(&part.reference);

        self.score_reference(&reference, ctx)
            + self.score_content(&designation, &reference, ctx)
            + self.score_position(&designation, ctx)
            + self.score_business(&designation, part, ctx)
    }

    fn score_reference(&self, reference: &str, ctx: &SearchContext) -> i64 {
        if reference == ctx.normalized_query {
            self.weights.exact_reference
        } else if !ctx.normalized_query.is_empty() && reference.contains(&ctx.normalized_query) {
            self.weights.partial_reference
        } else {
            0
        }
    }

    fn score_content(&self, designation: &str, reference: &str, ctx: &SearchContext) -> i64 {
        let w = &self.weights;
        let mut score = 0;

        // Per-token word-boundary matches dominate bag-of-words noise
        for token in ctx.tokens.iter().filter(|t| t.len() >= 3) {
            if contains_word(designation, token) {
                score += w.token_word_match;
            }
        }

        if let Some(part_type) = &ctx.main_type {
            let variant_hit = self
                .synonyms
                .variants(part_type)
                .iter()
                .any(|v| contains_phrase(designation, v));

            // Wrong-category candidates must rank below correct ones
            // even with other matches
            score += if variant_hit {
                w.type_variant_match
            } else {
                w.wrong_type_penalty
            };

            let is_accessory = self.accessory.is_match(designation);
            if designation == part_type.as_str() {
                score += w.exact_designation;
            } else if designation.starts_with(part_type.as_str()) && !is_accessory {
                score += w.type_prefix;
            } else if contains_word(designation, part_type) && !is_accessory {
                score += w.type_word;
            } else if variant_hit && is_accessory {
                score += w.accessory_penalty;
            }

            if variant_hit {
                let weight = self.synonyms.weight(part_type);
                score += (w.type_cooccurrence_base as f32 * weight) as i64;
            }
        }

        // Smaller reference tier inside the content component
        if !ctx.normalized_query.is_empty() {
            if reference == ctx.normalized_query {
                score += w.reference_equals_bonus;
            } else if reference.contains(&ctx.normalized_query) {
                score += w.reference_contains_bonus;
            }
        }

        // All tokens present somewhere
        if !ctx.tokens.is_empty()
            && ctx
                .tokens
                .iter()
                .all(|t| contains_word(designation, t) || reference.contains(t.as_str()))
        {
            score += w.all_tokens_bonus;
        }

        score
    }

    fn score_position(&self, designation: &str, ctx: &SearchContext) -> i64 {
        let w = &self.weights;
        let found = self.positions.detect(designation);
        let mut score = 0;

        if ctx.position.front {
            score += position_component(found.front, found.rear, w);
        }
        if ctx.position.rear {
            score += position_component(found.rear, found.front, w);
        }
        if ctx.position.left {
            score += position_component(found.left, found.right, w);
        }
        if ctx.position.right {
            score += position_component(found.right, found.left, w);
        }

        score
    }

    fn score_business(&self, designation: &str, part: &Part, ctx: &SearchContext) -> i64 {
        let w = &self.weights;
        let mut score = 0;

        if part.in_stock() {
            score += w.in_stock;
        }
        if let Some(model) = &ctx.model {
            if contains_phrase(designation, model) {
                score += w.model_match;
            }
        }

        score
    }
}

/// Matching marker earns the bonus; the opposing marker alone earns the
/// conflict penalty; a neutral designation earns neither.
fn position_component(matched: bool, opposed: bool, w: &ScoreWeights) -> i64 {
    if matched {
        w.position_match
    } else if opposed {
        w.position_conflict
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryClassifier;

    fn setup() -> (Scorer, QueryClassifier) {
        let synonyms = Arc::new(SynonymIndex::new());
        (
            Scorer::new(ScoreWeights::default(), synonyms.clone()),
            QueryClassifier::new(synonyms),
        )
    }

    #[test]
    fn test_exact_reference_beats_partial() {
        let (scorer, classifier) = setup();
        let ctx = classifier.classify("13780M62S00", false);

        let exact = Part::new("13780M62S00", "FILTRE A AIR CELERIO", 3, None);
        let partial = Part::new("13780M62S00XX", "FILTRE A AIR ALTO", 3, None);

        assert!(scorer.score(&exact, &ctx) > scorer.score(&partial, &ctx));
        assert!(scorer.score(&exact, &ctx) >= 1000);
    }

    #[test]
    fn test_wrong_category_never_outranks_correct() {
        let (scorer, classifier) = setup();
        let ctx = classifier.classify("amortisseur", false);

        let correct = Part::new("A1", "AMORTISSEUR AV G SWIFT", 0, None);
        let wrong = Part::new("A2", "COURROIE ALTERNATEUR SWIFT", 9, None);

        assert!(scorer.score(&correct, &ctx) > scorer.score(&wrong, &ctx));
        assert!(scorer.score(&wrong, &ctx) < 0);
    }

    #[test]
    fn test_accessory_ranks_below_part() {
        let (scorer, classifier) = setup();
        let ctx = classifier.classify("amortisseur arriere", false);

        let part = Part::new("A1", "AMORTISSEUR AR SWIFT", 1, None);
        let accessory = Part::new("A2", "SUPPORT AMORTISSEUR AR SWIFT", 1, None);

        assert!(scorer.score(&part, &ctx) > scorer.score(&accessory, &ctx));
    }

    #[test]
    fn test_position_conflict_penalty() {
        let (scorer, classifier) = setup();
        let ctx = classifier.classify("amortisseur avant", false);

        let front = Part::new("A1", "AMORTISSEUR AV G SWIFT", 1, None);
        let rear = Part::new("A2", "AMORTISSEUR AR G SWIFT", 1, None);

        let diff = scorer.score(&front, &ctx) - scorer.score(&rear, &ctx);
        // +300 versus -500 on the front/rear axis
        assert_eq!(diff, 800);
    }

    #[test]
    fn test_stock_and_model_bonuses() {
        let (scorer, classifier) = setup();
        let ctx = classifier.classify("amortisseur avant swift", false);

        let stocked = Part::new("A1", "AMORTISSEUR AV G SWIFT", 2, None);
        let empty = Part::new("A1", "AMORTISSEUR AV G SWIFT", 0, None);
        assert_eq!(scorer.score(&stocked, &ctx) - scorer.score(&empty, &ctx), 8);

        // Model word earns the token match plus the model bonus
        let other_model = Part::new("A1", "AMORTISSEUR AV G ALTO", 2, None);
        assert_eq!(
            scorer.score(&stocked, &ctx) - scorer.score(&other_model, &ctx),
            1050
        );
    }

    #[test]
    fn test_idempotent_scoring() {
        let (scorer, classifier) = setup();
        let ctx = classifier.classify("plaquette frein avant", false);
        let part = Part::new("P1", "PLAQUETTE FREIN AV CELERIO", 4, Some(95.0));

        let first = scorer.score(&part, &ctx);
        let second = scorer.score(&part, &ctx);
        assert_eq!(first, second);
    }
}
