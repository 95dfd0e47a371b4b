//! Session context tracker
//!
//! Labels each user turn with a topic, remembers the last part and the
//! active vehicle model, and rebuilds bare follow-up queries ("et pour
//! l'arrière ?") into complete searchable strings.
//!
//! The per-session context is recomputed from the full message history
//! on every cache miss or expiry — it is never patched incrementally,
//! except for the explicit `set_last_part` call.

use chrono::{DateTime, Duration, Utc};
use partsbot_common::config::ContextConfig;
use partsbot_common::errors::Result;
use partsbot_common::models::MessageRole;
use partsbot_common::normalize::DialectLexicon;
use partsbot_common::store::ConversationStore;
use partsbot_common::text::{contains_word, long_tokens, normalize};
use partsbot_search::{detect_model, PositionPatterns, SynonymIndex};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Topic labels and their keyword vocabulary
const TOPIC_TABLE: &[(&str, &[&str])] = &[
    ("freinage", &["frein", "plaquette", "plaquettes", "disque", "etrier", "tambour"]),
    ("suspension", &["amortisseur", "ressort", "triangle", "rotule", "cardan"]),
    ("filtration", &["filtre", "filtres"]),
    ("eclairage", &["phare", "feu", "feux", "clignotant", "veilleuse", "optique"]),
    ("moteur", &["moteur", "courroie", "bougie", "pompe", "radiateur", "echappement", "embrayage"]),
    ("carrosserie", &["pare-chocs", "aile", "capot", "portiere", "retroviseur", "vitre"]),
    ("electricite", &["batterie", "alternateur", "demarreur"]),
    ("pneumatique", &["pneu", "pneus", "jante", "roue"]),
];

/// Per-session conversation context, cached for at most the configured TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    /// Topic label per user turn, in order
    pub topics: Vec<String>,

    /// Last resolved topic label
    pub last_topic: Option<String>,

    /// Last resolved part name (synonym category key)
    pub last_part: Option<String>,

    /// Active vehicle model, from the most recent mention
    pub active_model: Option<String>,

    /// Number of user turns seen
    pub message_count: usize,

    /// When this context was computed; drives cache expiry
    pub computed_at: DateTime<Utc>,
}

/// The context tracker over a conversation store
pub struct ContextTracker {
    conversations: Arc<dyn ConversationStore>,
    synonyms: Arc<SynonymIndex>,
    lexicon: DialectLexicon,
    positions: PositionPatterns,
    followup: Regex,
    cache: RwLock<HashMap<String, SessionContext>>,
    ttl: Duration,
}

impl ContextTracker {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        synonyms: Arc<SynonymIndex>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            conversations,
            synonyms,
            lexicon: DialectLexicon::new(),
            positions: PositionPatterns::new(),
            followup: Regex::new(
                r"^et\b|\baussi\b|\bcombien\b|\bles\s+deux\b|\bmeme\b|\bpareil\b|\bjeux?\b",
            )
            .unwrap(),
            cache: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(config.cache_ttl_secs as i64),
        }
    }

    /// Topic label for one message. Dialect variants are normalized
    /// before keyword matching; brake pads win over generic "frein".
    pub fn topic_for(&self, text: &str) -> Option<String> {
        let effective = self.effective_text(text);

        if contains_word(&effective, "plaquette") || contains_word(&effective, "plaquettes") {
            return Some("freinage".to_string());
        }

        TOPIC_TABLE
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| contains_word(&effective, k)))
            .map(|(topic, _)| topic.to_string())
    }

    /// Part category for one message, with the brake-pad override
    pub fn part_for(&self, text: &str) -> Option<String> {
        let effective = self.effective_text(text);

        if contains_word(&effective, "plaquette") || contains_word(&effective, "plaquettes") {
            return Some("plaquette".to_string());
        }

        long_tokens(&effective)
            .iter()
            .find_map(|t| self.synonyms.category_of(t))
            .map(|c| c.to_string())
    }

    /// Session context, served from cache within the TTL, recomputed from
    /// the full message history otherwise.
    pub async fn context_for(&self, session_id: &str, now: DateTime<Utc>) -> Result<SessionContext> {
        {
            let cache = self.cache.read().await;
            if let Some(ctx) = cache.get(session_id) {
                if now - ctx.computed_at <= self.ttl {
                    metrics::counter!("partsbot_context_cache_hits_total").increment(1);
                    return Ok(ctx.clone());
                }
            }
        }
        metrics::counter!("partsbot_context_cache_misses_total").increment(1);

        let context = self.recompute(session_id, now).await?;
        let mut cache = self.cache.write().await;
        cache.insert(session_id.to_string(), context.clone());
        Ok(context)
    }

    async fn recompute(&self, session_id: &str, now: DateTime<Utc>) -> Result<SessionContext> {
        let history = self.conversations.history(session_id).await?;

        let mut context = SessionContext {
            topics: Vec::new(),
            last_topic: None,
            last_part: None,
            active_model: None,
            message_count: 0,
            computed_at: now,
        };

        for message in history.iter().filter(|m| m.role == MessageRole::User) {
            context.message_count += 1;

            if let Some(topic) = self.topic_for(&message.content) {
                context.last_topic = Some(topic.clone());
                context.topics.push(topic);
            }
            if let Some(part) = self.part_for(&message.content) {
                context.last_part = Some(part);
            }
            if let Some(model) = detect_model(&self.effective_text(&message.content)) {
                context.active_model = Some(model);
            }
        }

        debug!(
            session_id,
            turns = context.message_count,
            last_part = context.last_part.as_deref().unwrap_or("-"),
            "session context recomputed"
        );
        Ok(context)
    }

    /// Explicit patch after a resolved search; the one allowed exception
    /// to recompute-only semantics.
    pub async fn set_last_part(&self, session_id: &str, part: &str, now: DateTime<Utc>) {
        let mut cache = self.cache.write().await;
        let entry = cache
            .entry(session_id.to_string())
            .or_insert_with(|| SessionContext {
                topics: Vec::new(),
                last_topic: None,
                last_part: None,
                active_model: None,
                message_count: 0,
                computed_at: now,
            });
        entry.last_part = Some(part.to_string());
    }

    /// Merge a bare qualifier-only follow-up with the remembered context.
    /// A message that already names a part is used verbatim.
    pub async fn build_search_query(
        &self,
        session_id: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let effective = self.effective_text(message);

        let names_part = long_tokens(&effective)
            .iter()
            .any(|t| self.synonyms.category_of(t).is_some());
        if names_part {
            return Ok(message.to_string());
        }

        let position = self.positions.detect(&effective);
        if !position.any() && !self.followup.is_match(&effective) {
            return Ok(message.to_string());
        }

        let context = self.context_for(session_id, now).await?;
        let part = match context.last_part.or(context.last_topic) {
            Some(part) => part,
            None => return Ok(message.to_string()),
        };

        let mut words = vec![part];
        words.extend(position.qualifier_words().iter().map(|w| w.to_string()));
        if let Some(model) = context.active_model {
            words.push(model);
        }

        let merged = words.join(" ");
        debug!(session_id, merged = %merged, "follow-up merged with context");
        Ok(merged)
    }

    /// Drop cached contexts older than the TTL
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, ctx| now - ctx.computed_at <= self.ttl);
        before - cache.len()
    }

    /// Spawn the background cache sweep task
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                tracker.sweep(Utc::now()).await;
            }
        })
    }

    /// Dialect rewrite when the lexicon matches, canonical form otherwise
    fn effective_text(&self, text: &str) -> String {
        self.lexicon
            .apply(text)
            .unwrap_or_else(|| normalize(text))
    }
}
