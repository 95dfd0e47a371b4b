//! Search engine
//!
//! Composes the pipeline per call: classify → fetch candidates → score →
//! select. The catalog read is the only suspension point; everything
//! else is pure computation over the snapshot.

use crate::query::{QueryClassifier, SearchContext};
use crate::scorer::{ScoreWeights, ScoredPart, Scorer};
use crate::selector::{sort_ranked, ResultSelector};
use crate::synonyms::SynonymIndex;
use partsbot_common::config::SearchConfig;
use partsbot_common::errors::Result;
use partsbot_common::metrics::SearchTimer;
use partsbot_common::models::Part;
use partsbot_common::store::{CandidateFilter, CatalogStore};
use partsbot_common::text::normalize;
use std::sync::Arc;
use tracing::debug;

/// Outcome of one search call
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Parsed query context
    pub context: SearchContext,

    /// Thresholded, ordered, capped results
    pub ranked: Vec<ScoredPart>,

    /// A reference code was detected and drove the search; empty results
    /// still mean "a reference was attempted", not "fall through"
    pub reference_attempted: bool,
}

/// The search pipeline over a catalog store
pub struct SearchEngine {
    catalog: Arc<dyn CatalogStore>,
    synonyms: Arc<SynonymIndex>,
    classifier: QueryClassifier,
    scorer: Scorer,
    selector: ResultSelector,
    max_results: usize,
}

impl SearchEngine {
    /// Build the engine with default scoring weights
    pub fn new(catalog: Arc<dyn CatalogStore>, config: SearchConfig) -> Self {
        Self::with_weights(catalog, config, ScoreWeights::default())
    }

    /// Build the engine with an explicit weight table
    pub fn with_weights(
        catalog: Arc<dyn CatalogStore>,
        config: SearchConfig,
        weights: ScoreWeights,
    ) -> Self {
        let synonyms = Arc::new(SynonymIndex::new());
        let max_results = config.max_results;
        Self {
            catalog,
            synonyms: synonyms.clone(),
            classifier: QueryClassifier::new(synonyms.clone()),
            scorer: Scorer::new(weights, synonyms),
            selector: ResultSelector::new(config),
            max_results,
        }
    }

    /// Shared synonym index
    pub fn synonyms(&self) -> &Arc<SynonymIndex> {
        &self.synonyms
    }

    /// Query classifier (reference/position/model detection)
    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    /// Detect a reference code in a RAW query (pre-normalization)
    pub fn detect_reference(&self, raw: &str) -> Option<String> {
        self.classifier.detect_reference(raw)
    }

    /// Full search: reference short-circuit, then the free-text path.
    ///
    /// `dialect_normalized` is the standard-French rewrite when dialect
    /// was detected upstream; reference detection always runs on `raw`.
    pub async fn search(
        &self,
        raw: &str,
        dialect_normalized: Option<&str>,
    ) -> Result<SearchOutcome> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < 2 {
            return Ok(self.empty_outcome(trimmed));
        }

        if let Some(code) = self.detect_reference(trimmed) {
            return self.search_reference(&code).await;
        }

        let effective = dialect_normalized.unwrap_or(trimmed);
        self.search_text(effective, dialect_normalized.is_some())
            .await
    }

    /// Reference search path: filter on the code, rank by reference
    /// affinity. Always returns (even empty) to signal the attempt.
    pub async fn search_reference(&self, code: &str) -> Result<SearchOutcome> {
        let timer = SearchTimer::start("reference");
        let normalized_code = normalize(code);
        let context = self.classifier.classify(&normalized_code, false);

        let filter = CandidateFilter::for_reference(&normalized_code);
        let candidates = self.catalog.find_candidates(&filter).await?;

        let mut ranked: Vec<ScoredPart> = candidates
            .into_iter()
            .map(|part| {
                let score = self.scorer.score(&part, &context);
                ScoredPart { part, score }
            })
            .collect();
        sort_ranked(&mut ranked);
        ranked.truncate(self.max_results);

        debug!(code = %normalized_code, results = ranked.len(), "reference search");
        timer.finish(ranked.len());

        Ok(SearchOutcome {
            context,
            ranked,
            reference_attempted: true,
        })
    }

    /// Free-text search path
    pub async fn search_text(&self, query: &str, dialect_detected: bool) -> Result<SearchOutcome> {
        let timer = SearchTimer::start("free_text");
        let context = self.classifier.classify(query, dialect_detected);

        if context.expanded_terms.is_empty() {
            timer.finish(0);
            return Ok(SearchOutcome {
                context,
                ranked: Vec::new(),
                reference_attempted: false,
            });
        }

        let filter = CandidateFilter::for_terms(context.expanded_terms.clone());
        let candidates = self.catalog.find_candidates(&filter).await?;
        let fetched = candidates.len();

        let ranked = self.rank(candidates, &context);

        debug!(
            query = %context.normalized_query,
            candidates = fetched,
            results = ranked.len(),
            "free-text search"
        );
        timer.finish(ranked.len());

        Ok(SearchOutcome {
            context,
            ranked,
            reference_attempted: false,
        })
    }

    /// Score and select an already-fetched candidate set against a fresh
    /// query. Used when a clarification answer narrows prior candidates.
    pub fn rank_parts(&self, query: &str, parts: Vec<Part>, dialect_detected: bool) -> SearchOutcome {
        let context = self.classifier.classify(query, dialect_detected);
        let ranked = self.rank(parts, &context);
        SearchOutcome {
            context,
            ranked,
            reference_attempted: false,
        }
    }

    fn rank(&self, candidates: Vec<Part>, context: &SearchContext) -> Vec<ScoredPart> {
        let scored: Vec<ScoredPart> = candidates
            .into_iter()
            .map(|part| {
                let score = self.scorer.score(&part, context);
                ScoredPart { part, score }
            })
            .collect();

        self.selector.select(scored, context)
    }

    fn empty_outcome(&self, query: &str) -> SearchOutcome {
        SearchOutcome {
            context: self.classifier.classify(query, false),
            ranked: Vec::new(),
            reference_attempted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partsbot_common::store::MemoryCatalog;

    fn engine() -> SearchEngine {
        let catalog = Arc::new(MemoryCatalog::new(vec![
            Part::new("55810M68K10", "AMORTISSEUR AV G SWIFT", 2, Some(210.0)),
            Part::new("55820M68K20", "AMORTISSEUR AV D SWIFT", 1, Some(210.0)),
            Part::new("55830M68K30", "AMORTISSEUR AR G SWIFT", 3, Some(185.0)),
            Part::new("55840M68K40", "AMORTISSEUR AR D SWIFT", 0, Some(185.0)),
            Part::new("13780M62S00", "FILTRE A AIR CELERIO", 6, Some(38.5)),
            Part::new("55110M55T00", "DISQUE FREIN AV SWIFT", 4, Some(120.0)),
        ]));
        SearchEngine::new(catalog, SearchConfig::default())
    }

    #[tokio::test]
    async fn test_exact_reference_short_circuits() {
        let engine = engine();
        let outcome = engine.search("13780M62S00", None).await.unwrap();

        assert!(outcome.reference_attempted);
        assert_eq!(outcome.ranked.len(), 1);
        assert!(outcome.ranked[0].score >= 1000);
        assert_eq!(outcome.ranked[0].part.designation, "FILTRE A AIR CELERIO");
    }

    #[tokio::test]
    async fn test_unknown_reference_still_signals_attempt() {
        let engine = engine();
        let outcome = engine.search("99999Z99Z99", None).await.unwrap();

        assert!(outcome.reference_attempted);
        assert!(outcome.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_free_text_ranking() {
        let engine = engine();
        let outcome = engine.search("amortisseur avant", None).await.unwrap();

        assert!(!outcome.reference_attempted);
        assert!(!outcome.ranked.is_empty());
        // Front shocks outrank rear shocks
        assert!(outcome.ranked[0].part.designation.contains("AV"));
    }

    #[tokio::test]
    async fn test_short_query_is_empty_not_error() {
        let engine = engine();
        let outcome = engine.search(" a ", None).await.unwrap();
        assert!(outcome.ranked.is_empty());
    }

    #[tokio::test]
    async fn test_nonsense_combo_no_results() {
        let engine = engine();
        // "filtre frein" detects type=filtre; the frein designations take
        // the wrong-category penalty and fall under the threshold
        let outcome = engine.search("filtre frein", None).await.unwrap();
        let names: Vec<&str> = outcome
            .ranked
            .iter()
            .map(|s| s.part.designation.as_str())
            .collect();
        assert!(
            !names.iter().any(|d| d.contains("FREIN")),
            "wrong-category candidates leaked: {:?}",
            names
        );
    }

    #[tokio::test]
    async fn test_idempotent_ordering() {
        let engine = engine();
        let first = engine.search("amortisseur", None).await.unwrap();
        let second = engine.search("amortisseur", None).await.unwrap();

        let refs = |o: &SearchOutcome| {
            o.ranked
                .iter()
                .map(|s| s.part.reference.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(refs(&first), refs(&second));
    }

    #[tokio::test]
    async fn test_dialect_query_relaxed_threshold() {
        let engine = engine();
        // Dialect rewrite provided by the caller after lexicon hit
        let outcome = engine
            .search("amorti 9odem", Some("amortisseur avant"))
            .await
            .unwrap();
        assert!(outcome.context.dialect_detected);
        assert!(!outcome.ranked.is_empty());
    }
}
