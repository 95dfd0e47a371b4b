//! Dialect normalization capability
//!
//! Provides a unified interface over two implementations:
//! - AI-backed normalizer (external HTTP service, best-effort)
//! - Static dialect lexicon fallback (always available)
//!
//! Selection by availability and confidence happens here, behind the
//! capability — business logic never branches on which path ran.

use crate::config::NormalizerConfig;
use crate::errors::{AppError, Result};
use crate::text::normalize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of an AI normalization call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiNormalization {
    /// Normalized standard-French text
    pub normalized: String,

    /// Message is a greeting
    pub is_greeting: bool,

    /// Message is a thank-you
    pub is_thanks: bool,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

/// Trait for AI-backed normalization providers
#[async_trait]
pub trait NormalizeProvider: Send + Sync {
    /// Normalize a raw user message
    async fn normalize(&self, text: &str) -> Result<AiNormalization>;

    /// Provider name for logging
    fn provider_name(&self) -> &str;
}

/// HTTP normalization client
pub struct HttpNormalizer {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct NormalizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct NormalizeResponse {
    normalized: String,
    #[serde(default)]
    is_greeting: bool,
    #[serde(default)]
    is_thanks: bool,
    #[serde(default)]
    confidence: f32,
}

impl HttpNormalizer {
    /// Create a new HTTP normalizer
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            max_retries,
        })
    }

    /// Make request with retry
    async fn request_with_retry(&self, text: &str) -> Result<AiNormalization> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(text).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Normalization request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::NormalizationError {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, text: &str) -> Result<AiNormalization> {
        let url = format!("{}/normalize", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&NormalizeRequest { text });

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::NormalizationError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NormalizationError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: NormalizeResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::NormalizationError {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(AiNormalization {
            normalized: result.normalized,
            is_greeting: result.is_greeting,
            is_thanks: result.is_thanks,
            confidence: result.confidence,
        })
    }
}

#[async_trait]
impl NormalizeProvider for HttpNormalizer {
    async fn normalize(&self, text: &str) -> Result<AiNormalization> {
        self.request_with_retry(text).await
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

/// Static dialect/slang → standard-French dictionary.
///
/// Whole-word substitution over canonicalized text. Returning `None`
/// distinguishes "no dialect detected" from "normalized to itself".
pub struct DialectLexicon {
    entries: Vec<(&'static str, &'static str)>,
}

impl Default for DialectLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectLexicon {
    pub fn new() -> Self {
        Self {
            entries: vec![
                // Vehicle and generic vocabulary
                ("karhba", "voiture"),
                ("tomobile", "voiture"),
                // Parts
                ("amorti", "amortisseur"),
                ("amortisur", "amortisseur"),
                ("amortiseur", "amortisseur"),
                ("fren", "frein"),
                ("fran", "frein"),
                ("blakat", "plaquettes"),
                ("plakette", "plaquette"),
                ("fanar", "phare"),
                ("dhaw", "phare"),
                ("meraya", "retroviseur"),
                ("mrya", "retroviseur"),
                ("bab", "portiere"),
                ("goma", "pneu"),
                ("roda", "roue"),
                ("makina", "moteur"),
                ("batri", "batterie"),
                ("dinamo", "alternateur"),
                ("demarur", "demarreur"),
                ("bouji", "bougie"),
                ("courroi", "courroie"),
                ("embriyaj", "embrayage"),
                ("chakman", "echappement"),
                ("radiatur", "radiateur"),
                ("capo", "capot"),
                ("zit", "huile"),
                // Positions and sides
                ("odem", "avant"),
                ("9odem", "avant"),
                ("goddem", "avant"),
                ("loura", "arriere"),
                ("lowra", "arriere"),
                ("ysar", "gauche"),
                ("isar", "gauche"),
                ("ymin", "droite"),
                ("imin", "droite"),
            ],
        }
    }

    /// Substitute whole-word dialect matches inside `text`.
    /// Returns `None` when no entry matched.
    pub fn apply(&self, text: &str) -> Option<String> {
        let normalized = normalize(text);
        let mut replaced = false;

        let tokens: Vec<&str> = normalized
            .split_whitespace()
            .map(|token| {
                match self.entries.iter().find(|(dialect, _)| *dialect == token) {
                    Some((_, standard)) => {
                        replaced = true;
                        *standard
                    }
                    None => token,
                }
            })
            .collect();

        if replaced {
            Some(tokens.join(" "))
        } else {
            None
        }
    }
}

// Greeting/thanks vocabulary recognized by the rule-based fallback
const GREETING_TOKENS: &[&str] = &[
    "bonjour", "bonsoir", "salut", "salam", "aslema", "ahla", "hello", "hi", "coucou",
];
const THANKS_TOKENS: &[&str] = &[
    "merci", "chokran", "choukran", "aychek", "yaichek", "thanks", "mercii",
];

/// Outcome of the dialect analysis step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialectOutcome {
    /// Standard-French rewrite; `None` when no dialect was detected
    pub normalized: Option<String>,

    /// Message is a greeting
    pub is_greeting: bool,

    /// Message is a thank-you
    pub is_thanks: bool,

    /// True when the AI provider produced this outcome
    pub via_ai: bool,
}

/// Normalization capability: AI provider when available and confident,
/// static lexicon otherwise.
pub struct NormalizationService {
    provider: Option<Arc<dyn NormalizeProvider>>,
    lexicon: DialectLexicon,
    min_confidence: f32,
}

impl NormalizationService {
    /// Build the capability; `provider` is optional by design
    pub fn new(provider: Option<Arc<dyn NormalizeProvider>>, min_confidence: f32) -> Self {
        Self {
            provider,
            lexicon: DialectLexicon::new(),
            min_confidence,
        }
    }

    /// Rule-based only variant (no AI provider configured)
    pub fn rule_based() -> Self {
        Self::new(None, 0.0)
    }

    /// Build from configuration; the HTTP provider is enabled only when
    /// an API base is configured.
    pub fn from_config(config: &NormalizerConfig) -> Result<Self> {
        let provider: Option<Arc<dyn NormalizeProvider>> = match &config.api_base {
            Some(base) => Some(Arc::new(HttpNormalizer::new(
                base.clone(),
                config.api_key.clone(),
                config.timeout_secs,
                config.max_retries,
            )?)),
            None => None,
        };
        Ok(Self::new(provider, config.min_confidence))
    }

    /// Access the static lexicon directly (topic labeling uses this)
    pub fn lexicon(&self) -> &DialectLexicon {
        &self.lexicon
    }

    /// Analyze a raw message: greeting/thanks classification plus dialect
    /// rewrite. Falls back to the static lexicon when the AI provider is
    /// absent, fails, or reports low confidence.
    pub async fn analyze(&self, text: &str) -> DialectOutcome {
        if let Some(provider) = &self.provider {
            match provider.normalize(text).await {
                Ok(result) if result.confidence >= self.min_confidence => {
                    let canonical = normalize(text);
                    let rewritten = normalize(&result.normalized);
                    let changed = !rewritten.is_empty() && rewritten != canonical;
                    debug!(
                        provider = provider.provider_name(),
                        confidence = result.confidence,
                        changed,
                        "AI normalization accepted"
                    );
                    return DialectOutcome {
                        normalized: changed.then_some(rewritten),
                        is_greeting: result.is_greeting,
                        is_thanks: result.is_thanks,
                        via_ai: true,
                    };
                }
                Ok(result) => {
                    debug!(
                        confidence = result.confidence,
                        floor = self.min_confidence,
                        "AI normalization below confidence floor, using lexicon"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "AI normalization unavailable, using lexicon");
                }
            }
            metrics::counter!("partsbot_dialect_fallback_total").increment(1);
        }

        self.fallback(text)
    }

    /// Static-lexicon path
    fn fallback(&self, text: &str) -> DialectOutcome {
        let normalized = normalize(text);
        let is_greeting = normalized
            .split_whitespace()
            .any(|t| GREETING_TOKENS.contains(&t));
        let is_thanks = normalized
            .split_whitespace()
            .any(|t| THANKS_TOKENS.contains(&t));

        DialectOutcome {
            normalized: self.lexicon.apply(text),
            is_greeting,
            is_thanks,
            via_ai: false,
        }
    }
}
