//! Clarification state machine
//!
//! Per-session pending questions over one ambiguity dimension at a time:
//! `NONE → PENDING → (ANSWERED | EXPIRED)`. Exactly one pending context
//! per session; overwritten or cleared, never merged. A background sweep
//! drops contexts untouched for the configured TTL, and lookups treat an
//! expired context as absent even between sweeps.

use chrono::{DateTime, Duration, Utc};
use partsbot_common::config::ClarificationConfig;
use partsbot_common::metrics::record_clarification;
use partsbot_common::models::Part;
use partsbot_common::text::{contains_phrase, contains_word, long_tokens, normalize};
use partsbot_search::{PositionPatterns, PositionRequirements, SearchContext, SynonymIndex};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Axis of ambiguity being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Position,
    Side,
    Type,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Position => "position",
            Dimension::Side => "side",
            Dimension::Type => "type",
        }
    }
}

/// Pending clarification state for one session
#[derive(Debug, Clone)]
pub struct ClarificationContext {
    /// The query the question was raised against
    pub original_query: String,

    /// Dimension being asked
    pub dimension: Dimension,

    /// Candidate set the ambiguity was observed in
    pub candidates: Vec<Part>,

    /// Creation timestamp, drives expiry
    pub created_at: DateTime<Utc>,
}

/// A question the manager wants asked
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub dimension: Dimension,
    pub question: String,
}

/// Result of feeding a user message to a pending clarification
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    /// Answer narrowed the candidates to an unambiguous set
    Resolved { query: String, parts: Vec<Part> },

    /// Answer still left >1 distinct value on a later dimension; the
    /// machine re-entered PENDING instead of guessing
    ReAsk {
        dimension: Dimension,
        question: String,
    },
}

/// Distinct dimension values observed across candidate designations
#[derive(Debug, Default)]
struct DimensionValues {
    positions: BTreeSet<&'static str>,
    sides: BTreeSet<&'static str>,
    types: BTreeSet<String>,
}

/// Filler words ignored when re-extracting a part name from a query
const PART_NAME_STOPWORDS: &[&str] = &[
    "avant", "arriere", "gauche", "droite", "droit", "pour", "les", "des", "mes", "une", "piece",
    "pieces", "voiture", "aussi", "cherche", "veux", "faut",
];

/// Fixed category menu offered on generic queries
const GENERIC_MENU: &str =
    "plaquettes de frein, amortisseurs, filtres, phares, batteries, courroies";

/// The clarification manager. State lives in a process-local map keyed
/// by session id; messages for one session arrive sequentially by
/// protocol, so the lock only satisfies `Send` bounds.
pub struct ClarificationManager {
    pending: RwLock<HashMap<String, ClarificationContext>>,
    ttl: Duration,
    positions: PositionPatterns,
    synonyms: Arc<SynonymIndex>,
    generic: Regex,
}

impl ClarificationManager {
    pub fn new(config: &ClarificationConfig, synonyms: Arc<SynonymIndex>) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(config.ttl_secs as i64),
            positions: PositionPatterns::new(),
            synonyms,
            generic: Regex::new(r"\bpieces?\b\s*(?:pour|de|d|dispo|disponibles?)?\b").unwrap(),
        }
    }

    /// Decide whether the retrieved candidates need a clarification
    /// question before answering.
    pub fn check_needed(
        &self,
        ctx: &SearchContext,
        survivors: &[Part],
    ) -> Option<PendingQuestion> {
        // Generic browsing ("pièces pour ma Suzuki"): offer the category menu
        if ctx.main_type.is_none() && self.generic.is_match(&ctx.normalized_query) {
            return Some(PendingQuestion {
                dimension: Dimension::Type,
                question: format!(
                    "Quel type de pièce cherchez-vous ? Par exemple : {}.",
                    GENERIC_MENU
                ),
            });
        }

        // Brake pads without a position always need one
        if ctx.main_type.as_deref() == Some("plaquette") && !ctx.position.position_specified() {
            return Some(PendingQuestion {
                dimension: Dimension::Position,
                question: position_question(),
            });
        }

        if survivors.len() < 2 {
            return None;
        }

        let values = self.collect_values(survivors);
        self.pick_dimension(&ctx.position, ctx.main_type.as_deref(), &values)
            .map(|dimension| PendingQuestion {
                question: self.question_for(dimension, &values),
                dimension,
            })
    }

    /// Priority order: position first, side only for bilateral parts once
    /// position is known, type last.
    fn pick_dimension(
        &self,
        required: &PositionRequirements,
        main_type: Option<&str>,
        values: &DimensionValues,
    ) -> Option<Dimension> {
        if !required.position_specified() && values.positions.len() >= 2 {
            return Some(Dimension::Position);
        }

        let bilateral = main_type.map(|t| self.synonyms.is_bilateral(t)).unwrap_or(false);
        if bilateral
            && required.position_specified()
            && !required.side_specified()
            && values.sides.len() >= 2
        {
            return Some(Dimension::Side);
        }

        if main_type.is_none() && values.types.len() >= 2 {
            return Some(Dimension::Type);
        }

        None
    }

    fn collect_values(&self, parts: &[Part]) -> DimensionValues {
        let mut values = DimensionValues::default();

        for part in parts {
            let designation = normalize(&part.designation);
            let pos = self.positions.detect(&designation);
            if pos.front {
                values.positions.insert("avant");
            }
            if pos.rear {
                values.positions.insert("arriere");
            }
            if pos.left {
                values.sides.insert("gauche");
            }
            if pos.right {
                values.sides.insert("droite");
            }

            if let Some(category) = long_tokens(&designation)
                .iter()
                .find_map(|t| self.synonyms.category_of(t))
            {
                values.types.insert(category.to_string());
            }
        }

        values
    }

    fn question_for(&self, dimension: Dimension, values: &DimensionValues) -> String {
        match dimension {
            Dimension::Position => position_question(),
            Dimension::Side => side_question(),
            Dimension::Type => {
                let list: Vec<&str> = values.types.iter().map(|s| s.as_str()).collect();
                format!("Quel type de pièce cherchez-vous ? ({}) ?", list.join(", "))
            }
        }
    }

    /// NONE → PENDING. Overwrites any previous pending context.
    pub async fn begin(
        &self,
        session_id: &str,
        original_query: &str,
        dimension: Dimension,
        candidates: Vec<Part>,
        now: DateTime<Utc>,
    ) {
        debug!(session_id, dimension = dimension.as_str(), "clarification pending");
        record_clarification(dimension.as_str());

        let mut pending = self.pending.write().await;
        pending.insert(
            session_id.to_string(),
            ClarificationContext {
                original_query: original_query.to_string(),
                dimension,
                candidates,
                created_at: now,
            },
        );
    }

    /// Current pending context, treating anything older than the TTL as
    /// absent (EXPIRED behaves like NONE between sweeps).
    pub async fn pending_for(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Option<ClarificationContext> {
        let mut pending = self.pending.write().await;
        match pending.get(session_id) {
            Some(ctx) if now - ctx.created_at > self.ttl => {
                pending.remove(session_id);
                None
            }
            Some(ctx) => Some(ctx.clone()),
            None => None,
        }
    }

    /// PENDING → ANSWERED | PENDING (re-entry). Returns `None` when there
    /// is no pending context or the message does not answer it — the
    /// caller then treats the message as a fresh query.
    pub async fn handle_answer(
        &self,
        session_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Option<AnswerOutcome> {
        let ctx = self.pending_for(session_id, now).await?;

        let msg = normalize(message);
        let answer = self.positions.detect(&msg);

        let original_tokens = self.part_name_tokens(&ctx.original_query);
        // A message naming a different part is a fresh query, not an answer
        if ctx.dimension != Dimension::Type && self.names_other_part(&msg, &original_tokens) {
            return None;
        }

        let answered = match ctx.dimension {
            Dimension::Position => answer.position_specified(),
            Dimension::Side => answer.side_specified(),
            Dimension::Type => self.first_category(&msg).is_some(),
        };
        if !answered {
            return None;
        }

        {
            let mut pending = self.pending.write().await;
            pending.remove(session_id);
        }

        if ctx.dimension == Dimension::Type {
            // The named category replaces the part name entirely; the
            // caller runs a fresh search for it
            let category = self.first_category(&msg).unwrap_or_default();
            debug!(session_id, category = %category, "type clarification answered");
            return Some(AnswerOutcome::Resolved {
                query: category,
                parts: Vec::new(),
            });
        }

        // Re-extract the part name and combine with the new qualifier
        let original_required = self.positions.detect(&normalize(&ctx.original_query));
        let required = original_required.merged_with(answer);

        let filtered = self.filter_candidates(&ctx.candidates, &original_tokens, &required);
        let combined_query = combine_query(&original_tokens, &required);

        // Still ambiguous: re-enter PENDING for the next dimension
        let values = self.collect_values(&filtered);
        let main_type = original_tokens
            .iter()
            .find_map(|t| self.synonyms.category_of(t))
            .map(|c| c.to_string());

        if filtered.len() > 1 {
            if let Some(dimension) = self.pick_dimension(&required, main_type.as_deref(), &values) {
                let question = self.question_for(dimension, &values);
                self.begin(session_id, &combined_query, dimension, filtered, now)
                    .await;
                return Some(AnswerOutcome::ReAsk {
                    dimension,
                    question,
                });
            }
        }

        debug!(session_id, query = %combined_query, matches = filtered.len(), "clarification resolved");
        Some(AnswerOutcome::Resolved {
            query: combined_query,
            parts: filtered,
        })
    }

    /// Candidates must carry a part-name token (or a synonym variant of
    /// its category) AND satisfy every stated position/side dimension.
    fn filter_candidates(
        &self,
        candidates: &[Part],
        part_tokens: &[String],
        required: &PositionRequirements,
    ) -> Vec<Part> {
        candidates
            .iter()
            .filter(|part| {
                let designation = normalize(&part.designation);

                let name_hit = part_tokens.is_empty()
                    || part_tokens.iter().any(|t| {
                        contains_word(&designation, t)
                            || self
                                .synonyms
                                .category_of(t)
                                .map(|c| {
                                    self.synonyms
                                        .variants(c)
                                        .iter()
                                        .any(|v| contains_phrase(&designation, v))
                                })
                                .unwrap_or(false)
                    });
                if !name_hit {
                    return false;
                }

                let pos = self.positions.detect(&designation);
                (!required.front || pos.front)
                    && (!required.rear || pos.rear)
                    && (!required.left || pos.left)
                    && (!required.right || pos.right)
            })
            .cloned()
            .collect()
    }

    fn part_name_tokens(&self, query: &str) -> Vec<String> {
        long_tokens(&normalize(query))
            .into_iter()
            .filter(|t| !PART_NAME_STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    fn first_category(&self, normalized: &str) -> Option<String> {
        long_tokens(normalized)
            .iter()
            .find_map(|t| self.synonyms.category_of(t))
            .map(|c| c.to_string())
    }

    fn names_other_part(&self, normalized_msg: &str, original_tokens: &[String]) -> bool {
        let original_categories: BTreeSet<&str> = original_tokens
            .iter()
            .filter_map(|t| self.synonyms.category_of(t))
            .collect();

        long_tokens(normalized_msg)
            .iter()
            .filter_map(|t| self.synonyms.category_of(t))
            .any(|c| !original_categories.contains(c))
    }

    /// Drop every pending context older than the TTL. Returns the number
    /// of dropped entries.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, ctx| now - ctx.created_at <= self.ttl);
        let dropped = before - pending.len();

        if dropped > 0 {
            debug!(dropped, "clarification sweep");
            metrics::counter!("partsbot_clarifications_expired_total").increment(dropped as u64);
        }
        dropped
    }

    /// Spawn the background sweep task. The sweep only deletes entries,
    /// never mutates live ones, so it needs no coordination with request
    /// handling.
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                manager.sweep(Utc::now()).await;
            }
        })
    }
}

fn position_question() -> String {
    "Vous cherchez pour l'avant ou l'arrière ?".to_string()
}

fn side_question() -> String {
    "Côté gauche ou côté droit ?".to_string()
}

fn combine_query(part_tokens: &[String], required: &PositionRequirements) -> String {
    let mut words: Vec<&str> = part_tokens.iter().map(|s| s.as_str()).collect();
    words.extend(required.qualifier_words());
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use partsbot_common::config::ClarificationConfig;
    use partsbot_search::QueryClassifier;

    fn manager() -> ClarificationManager {
        ClarificationManager::new(&ClarificationConfig::default(), Arc::new(SynonymIndex::new()))
    }

    fn classify(query: &str) -> SearchContext {
        QueryClassifier::new(Arc::new(SynonymIndex::new())).classify(query, false)
    }

    fn shock_catalog() -> Vec<Part> {
        vec![
            Part::new("55810", "AMORTISSEUR AV G SWIFT", 2, None),
            Part::new("55820", "AMORTISSEUR AV D SWIFT", 1, None),
            Part::new("55830", "AMORTISSEUR AR G SWIFT", 3, None),
            Part::new("55840", "AMORTISSEUR AR D SWIFT", 0, None),
        ]
    }

    #[test]
    fn test_position_asked_before_side() {
        let m = manager();
        let ctx = classify("amortisseur");
        // Sides tie 2-2 as well, but position has priority
        let q = m.check_needed(&ctx, &shock_catalog()).unwrap();
        assert_eq!(q.dimension, Dimension::Position);
    }

    #[test]
    fn test_no_clarification_when_position_given() {
        let m = manager();
        let ctx = classify("amortisseur avant gauche");
        let survivors = vec![Part::new("55810", "AMORTISSEUR AV G SWIFT", 2, None)];
        assert!(m.check_needed(&ctx, &survivors).is_none());
    }

    #[test]
    fn test_brake_pads_always_need_position() {
        let m = manager();
        let ctx = classify("plaquette frein");
        // Even a single candidate does not bypass the rule
        let survivors = vec![Part::new("55200", "PLAQUETTE FREIN AV CELERIO", 5, None)];
        let q = m.check_needed(&ctx, &survivors).unwrap();
        assert_eq!(q.dimension, Dimension::Position);
    }

    #[test]
    fn test_generic_query_offers_menu() {
        let m = manager();
        let ctx = classify("pieces pour ma suzuki");
        let q = m.check_needed(&ctx, &[]).unwrap();
        assert_eq!(q.dimension, Dimension::Type);
        assert!(q.question.contains("plaquettes"));
    }

    #[test]
    fn test_non_bilateral_type_skips_side() {
        let m = manager();
        let ctx = classify("plaquette frein avant");
        let survivors = vec![
            Part::new("55200", "PLAQUETTE FREIN AV CELERIO", 5, None),
            Part::new("55201", "PLAQUETTE FREIN AV SWIFT", 2, None),
        ];
        // Position is given and plaquettes are not bilateral
        assert!(m.check_needed(&ctx, &survivors).is_none());
    }

    #[tokio::test]
    async fn test_answer_reenters_on_side() {
        let m = manager();
        let now = Utc::now();
        m.begin("s1", "amortisseur", Dimension::Position, shock_catalog(), now)
            .await;

        match m.handle_answer("s1", "avant", now).await.unwrap() {
            AnswerOutcome::ReAsk { dimension, .. } => assert_eq!(dimension, Dimension::Side),
            other => panic!("expected re-ask, got {:?}", other),
        }

        // Second answer resolves to the single front-left shock
        match m.handle_answer("s1", "gauche", now).await.unwrap() {
            AnswerOutcome::Resolved { parts, query } => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].designation, "AMORTISSEUR AV G SWIFT");
                assert!(query.contains("amortisseur"));
                assert!(query.contains("avant"));
                assert!(query.contains("gauche"));
            }
            other => panic!("expected resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_combined_pair_answer_resolves_directly() {
        let m = manager();
        let now = Utc::now();
        m.begin("s1", "amortisseur", Dimension::Position, shock_catalog(), now)
            .await;

        match m.handle_answer("s1", "avant gauche", now).await.unwrap() {
            AnswerOutcome::Resolved { parts, .. } => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].designation, "AMORTISSEUR AV G SWIFT");
            }
            other => panic!("expected resolution, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_contextual_follow_up_answers() {
        let m = manager();
        let now = Utc::now();
        m.begin("s1", "amortisseur", Dimension::Position, shock_catalog(), now)
            .await;

        // "et pour l'arrière ?" carries the position token
        match m.handle_answer("s1", "et pour l'arrière ?", now).await.unwrap() {
            AnswerOutcome::ReAsk { dimension, .. } => assert_eq!(dimension, Dimension::Side),
            other => panic!("expected re-ask, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fresh_query_is_not_an_answer() {
        let m = manager();
        let now = Utc::now();
        m.begin("s1", "amortisseur", Dimension::Position, shock_catalog(), now)
            .await;

        // Names a different part: not an answer, pending stays
        assert!(m
            .handle_answer("s1", "disque frein avant", now)
            .await
            .is_none());
        assert!(m.pending_for("s1", now).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_context_is_absent() {
        let m = manager();
        let now = Utc::now();
        m.begin("s1", "amortisseur", Dimension::Position, shock_catalog(), now)
            .await;

        let later = now + Duration::minutes(11);
        assert!(m.pending_for("s1", later).await.is_none());
        // And the answer falls through to fresh-search handling
        assert!(m.handle_answer("s1", "avant", later).await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_drops_only_old_entries() {
        let m = manager();
        let now = Utc::now();
        m.begin("old", "amortisseur", Dimension::Position, shock_catalog(), now)
            .await;
        m.begin(
            "fresh",
            "amortisseur",
            Dimension::Position,
            shock_catalog(),
            now + Duration::minutes(8),
        )
        .await;

        let dropped = m.sweep(now + Duration::minutes(11)).await;
        assert_eq!(dropped, 1);
        assert!(m.pending_for("fresh", now + Duration::minutes(11)).await.is_some());
    }

    #[tokio::test]
    async fn test_type_answer_returns_fresh_query() {
        let m = manager();
        let now = Utc::now();
        m.begin("s1", "pieces pour ma suzuki", Dimension::Type, Vec::new(), now)
            .await;

        match m.handle_answer("s1", "des plaquettes", now).await.unwrap() {
            AnswerOutcome::Resolved { query, parts } => {
                assert_eq!(query, "plaquette");
                assert!(parts.is_empty());
            }
            other => panic!("expected resolution, got {:?}", other),
        }
    }
}
