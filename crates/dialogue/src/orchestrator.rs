//! Orchestrator
//!
//! Sequences one incoming message through the pipeline: greeting/thanks
//! short-circuit, pending clarification answer, reference short-circuit,
//! context-merged free-text search, model-mismatch probe, clarification
//! check, context update.

use crate::clarification::{AnswerOutcome, ClarificationManager};
use crate::context::ContextTracker;
use chrono::{DateTime, Utc};
use partsbot_common::config::AppConfig;
use partsbot_common::errors::Result;
use partsbot_common::models::{ChatMessage, Part};
use partsbot_common::normalize::NormalizationService;
use partsbot_common::store::{CatalogStore, ConversationStore};
use partsbot_common::text::{contains_phrase, normalize};
use partsbot_search::{ScoredPart, SearchEngine, SearchOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Final intent of one handled message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Results,
    NoResults,
    ClarificationNeeded,
    ModelMismatch,
    Greeting,
    Thanks,
}

/// Structured result returned to the rendering collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub intent: Intent,

    pub products: Vec<ScoredPart>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}

impl ChatOutcome {
    fn results(products: Vec<ScoredPart>) -> Self {
        Self {
            intent: Intent::Results,
            products,
            clarification_question: None,
        }
    }

    fn no_results() -> Self {
        Self {
            intent: Intent::NoResults,
            products: Vec::new(),
            clarification_question: None,
        }
    }

    fn clarification(question: String) -> Self {
        Self {
            intent: Intent::ClarificationNeeded,
            products: Vec::new(),
            clarification_question: Some(question),
        }
    }

    fn simple(intent: Intent) -> Self {
        Self {
            intent,
            products: Vec::new(),
            clarification_question: None,
        }
    }
}

/// The per-message pipeline over the search engine and dialogue state
pub struct Orchestrator {
    engine: SearchEngine,
    clarifications: Arc<ClarificationManager>,
    tracker: Arc<ContextTracker>,
    conversations: Arc<dyn ConversationStore>,
    normalization: NormalizationService,
    sweep_interval: std::time::Duration,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        conversations: Arc<dyn ConversationStore>,
        normalization: NormalizationService,
        config: &AppConfig,
    ) -> Self {
        let engine = SearchEngine::new(catalog, config.search.clone());
        let synonyms = engine.synonyms().clone();

        Self {
            clarifications: Arc::new(ClarificationManager::new(
                &config.clarification,
                synonyms.clone(),
            )),
            tracker: Arc::new(ContextTracker::new(
                conversations.clone(),
                synonyms,
                &config.context,
            )),
            engine,
            conversations,
            normalization,
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Spawn the clarification and context-cache sweep tasks. The host
    /// owns the handles; the library never spawns implicitly.
    pub fn spawn_sweepers(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            self.clarifications.spawn_sweeper(self.sweep_interval),
            self.tracker.spawn_sweeper(self.sweep_interval),
        ]
    }

    /// The clarification manager (exposed for host-driven sweeps)
    pub fn clarifications(&self) -> &Arc<ClarificationManager> {
        &self.clarifications
    }

    /// Handle one incoming user message for a session
    pub async fn handle_message(&self, session_id: &str, text: &str) -> Result<ChatOutcome> {
        let trimmed = text.trim();
        if trimmed.chars().count() < 2 {
            return Ok(ChatOutcome::no_results());
        }

        self.conversations
            .append(session_id, ChatMessage::user(trimmed))
            .await?;
        let now = Utc::now();

        let dialect = self.normalization.analyze(trimmed).await;
        if dialect.is_greeting {
            return Ok(ChatOutcome::simple(Intent::Greeting));
        }
        if dialect.is_thanks {
            return Ok(ChatOutcome::simple(Intent::Thanks));
        }

        let dialect_detected = dialect.normalized.is_some();
        let effective = dialect
            .normalized
            .unwrap_or_else(|| trimmed.to_string());

        // Pending clarification answer comes before everything else
        if let Some(outcome) = self
            .clarifications
            .handle_answer(session_id, &effective, now)
            .await
        {
            return self.finish_answer(session_id, outcome, dialect_detected, now).await;
        }

        // Reference short-circuit: raw query, pre-normalization
        if let Some(code) = self.engine.detect_reference(trimmed) {
            info!(session_id, code = %code, "reference query");
            let outcome = self.engine.search_reference(&code).await?;
            return self.finish_search(session_id, outcome, now, false).await;
        }

        // Free-text path with context merging
        let query = self
            .tracker
            .build_search_query(session_id, &effective, now)
            .await?;
        let outcome = self.engine.search_text(&query, dialect_detected).await?;
        self.finish_search(session_id, outcome, now, true).await
    }

    async fn finish_answer(
        &self,
        session_id: &str,
        outcome: AnswerOutcome,
        dialect_detected: bool,
        now: DateTime<Utc>,
    ) -> Result<ChatOutcome> {
        match outcome {
            AnswerOutcome::ReAsk { question, .. } => Ok(ChatOutcome::clarification(question)),
            AnswerOutcome::Resolved { query, parts } => {
                // A type answer starts a fresh search, which may itself
                // be ambiguous on position; a position/side answer
                // re-ranks the narrowed candidates, whose residual
                // ambiguity was already handled by the manager
                let fresh = parts.is_empty();
                let outcome = if fresh {
                    self.engine.search_text(&query, dialect_detected).await?
                } else {
                    self.engine.rank_parts(&query, parts, dialect_detected)
                };
                self.finish_search(session_id, outcome, now, fresh).await
            }
        }
    }

    async fn finish_search(
        &self,
        session_id: &str,
        outcome: SearchOutcome,
        now: DateTime<Utc>,
        allow_clarification: bool,
    ) -> Result<ChatOutcome> {
        let survivors: Vec<Part> = outcome.ranked.iter().map(|s| s.part.clone()).collect();

        // Model mismatch: the part exists, the requested model is absent
        let model = match outcome.context.model.clone() {
            Some(model) => Some(model),
            None => {
                self.tracker
                    .context_for(session_id, now)
                    .await?
                    .active_model
            }
        };
        if let Some(model) = model {
            let model_seen = survivors
                .iter()
                .any(|p| contains_phrase(&normalize(&p.designation), &model));
            if !survivors.is_empty() && !model_seen {
                debug!(session_id, model = %model, "model mismatch");
                return Ok(ChatOutcome {
                    intent: Intent::ModelMismatch,
                    products: outcome.ranked,
                    clarification_question: None,
                });
            }
        }

        if allow_clarification && !outcome.reference_attempted {
            if let Some(question) = self.clarifications.check_needed(&outcome.context, &survivors) {
                self.clarifications
                    .begin(
                        session_id,
                        &outcome.context.original_query,
                        question.dimension,
                        survivors,
                        now,
                    )
                    .await;
                return Ok(ChatOutcome::clarification(question.question));
            }
        }

        if outcome.ranked.is_empty() {
            return Ok(ChatOutcome::no_results());
        }

        // Remember what was resolved for follow-up turns
        if let Some(part) = outcome.context.main_type.clone() {
            self.tracker.set_last_part(session_id, &part, now).await;
        }

        Ok(ChatOutcome::results(outcome.ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partsbot_common::store::{MemoryCatalog, MemoryConversations};

    fn catalog() -> Arc<MemoryCatalog> {
        Arc::new(MemoryCatalog::new(vec![
            Part::new("55810M68K10", "AMORTISSEUR AV G SWIFT", 2, Some(210.0)),
            Part::new("55820M68K20", "AMORTISSEUR AV D SWIFT", 1, Some(210.0)),
            Part::new("55830M68K30", "AMORTISSEUR AR G SWIFT", 3, Some(185.0)),
            Part::new("55840M68K40", "AMORTISSEUR AR D SWIFT", 2, Some(185.0)),
            Part::new("55200M62S10", "PLAQUETTE FREIN AV CELERIO", 5, Some(95.0)),
            Part::new("55210M62S20", "PLAQUETTE FREIN AR CELERIO", 4, Some(90.0)),
            Part::new("13780M62S00", "FILTRE A AIR CELERIO", 6, Some(38.5)),
        ]))
    }

    fn orchestrator() -> Orchestrator {
        orchestrator_with(catalog())
    }

    fn orchestrator_with(catalog: Arc<MemoryCatalog>) -> Orchestrator {
        Orchestrator::new(
            catalog,
            Arc::new(MemoryConversations::new()),
            NormalizationService::rule_based(),
            &AppConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_clarification_dialogue_narrows_twice() {
        let bot = orchestrator();

        // Turn 1: four shocks, front/rear ambiguous
        let out = bot.handle_message("s1", "amortisseur").await.unwrap();
        assert_eq!(out.intent, Intent::ClarificationNeeded);
        assert!(out.clarification_question.unwrap().contains("avant"));

        // Turn 2: position answered, sides still ambiguous
        let out = bot.handle_message("s1", "avant").await.unwrap();
        assert_eq!(out.intent, Intent::ClarificationNeeded);
        assert!(out.clarification_question.unwrap().contains("gauche"));

        // Turn 3: side answered, one part left
        let out = bot.handle_message("s1", "gauche").await.unwrap();
        assert_eq!(out.intent, Intent::Results);
        assert_eq!(out.products.len(), 1);
        assert_eq!(out.products[0].part.designation, "AMORTISSEUR AV G SWIFT");
    }

    #[tokio::test]
    async fn test_reference_query_skips_clarification() {
        let bot = orchestrator();
        let out = bot.handle_message("s1", "13780M62S00").await.unwrap();

        assert_eq!(out.intent, Intent::Results);
        assert_eq!(out.products.len(), 1);
        assert!(out.products[0].score >= 1000);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_no_results() {
        let bot = orchestrator();
        let out = bot.handle_message("s1", "99999Z99Z99").await.unwrap();
        assert_eq!(out.intent, Intent::NoResults);
    }

    #[tokio::test]
    async fn test_nonsense_combo_is_no_results() {
        // Brake-only catalog: "filtre frein" retrieves the frein parts
        // but the wrong-category penalty pushes them under the threshold
        let bot = orchestrator_with(Arc::new(MemoryCatalog::new(vec![
            Part::new("55200M62S10", "PLAQUETTE FREIN AV CELERIO", 5, Some(95.0)),
            Part::new("55110M55T00", "DISQUE FREIN AV SWIFT", 4, Some(120.0)),
        ])));

        let out = bot.handle_message("s1", "filtre frein").await.unwrap();
        assert_eq!(out.intent, Intent::NoResults);
    }

    #[tokio::test]
    async fn test_greeting_and_thanks() {
        let bot = orchestrator();
        let out = bot.handle_message("s1", "bonjour").await.unwrap();
        assert_eq!(out.intent, Intent::Greeting);

        let out = bot.handle_message("s1", "merci !").await.unwrap();
        assert_eq!(out.intent, Intent::Thanks);
    }

    #[tokio::test]
    async fn test_short_query_is_empty() {
        let bot = orchestrator();
        let out = bot.handle_message("s1", " a ").await.unwrap();
        assert_eq!(out.intent, Intent::NoResults);
    }

    #[tokio::test]
    async fn test_model_mismatch_is_explicit() {
        let bot = orchestrator();
        // Shocks exist, but only for the Swift
        let out = bot.handle_message("s1", "amortisseur avant gauche jimny").await.unwrap();
        assert_eq!(out.intent, Intent::ModelMismatch);
        assert!(!out.products.is_empty());
    }

    #[tokio::test]
    async fn test_follow_up_uses_context() {
        let bot = orchestrator();

        let out = bot.handle_message("s1", "plaquette frein avant").await.unwrap();
        assert_eq!(out.intent, Intent::Results);

        // Bare qualifier follow-up inherits the part from context
        let out = bot.handle_message("s1", "et pour l'arrière ?").await.unwrap();
        assert_eq!(out.intent, Intent::Results);
        assert_eq!(out.products[0].part.designation, "PLAQUETTE FREIN AR CELERIO");
    }

    #[tokio::test]
    async fn test_dialect_query_resolves() {
        let bot = orchestrator();
        // "fren odem" → "frein avant" through the lexicon
        let out = bot.handle_message("s1", "plaquette fren odem").await.unwrap();
        assert_eq!(out.intent, Intent::Results);
        assert!(out.products[0].part.designation.contains("PLAQUETTE"));
    }

    #[tokio::test]
    async fn test_generic_query_offers_type_menu() {
        let bot = orchestrator();
        let out = bot.handle_message("s1", "des pièces pour ma voiture").await.unwrap();
        assert_eq!(out.intent, Intent::ClarificationNeeded);
        assert!(out.clarification_question.unwrap().contains("type de pièce"));

        // Answering with a category runs a fresh search for it
        let out = bot.handle_message("s1", "des amortisseurs").await.unwrap();
        assert_eq!(out.intent, Intent::ClarificationNeeded); // position next
    }
}
