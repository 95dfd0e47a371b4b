//! Store contracts for external collaborators
//!
//! The core builds predicates and reads snapshots; it never owns
//! persistence. Both traits ship with in-memory implementations used by
//! tests and by hosts that embed the core directly.

use crate::errors::Result;
use crate::models::{ChatMessage, Part};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Candidate filter predicate built by the core, executed by the store.
///
/// Semantics: a part matches when its designation contains ANY of `terms`
/// (case-insensitive substring), OR its reference contains
/// `reference_contains`. An empty filter matches nothing.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    /// Designation substring terms (normalized, OR-combined)
    pub terms: Vec<String>,

    /// Reference substring, set on the reference search path
    pub reference_contains: Option<String>,
}

impl CandidateFilter {
    /// Filter by designation terms
    pub fn for_terms(terms: Vec<String>) -> Self {
        Self {
            terms,
            reference_contains: None,
        }
    }

    /// Filter by reference substring
    pub fn for_reference(code: &str) -> Self {
        Self {
            terms: Vec::new(),
            reference_contains: Some(code.to_string()),
        }
    }

    /// True when the filter can never match
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.reference_contains.is_none()
    }
}

/// Read-only catalog access
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch candidate parts matching the filter
    async fn find_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Part>>;
}

/// Conversation history access
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch the ordered message history for a session
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// Append a message to a session
    async fn append(&self, session_id: &str, message: ChatMessage) -> Result<()>;
}

/// In-memory catalog used in tests and embedded deployments
#[derive(Default)]
pub struct MemoryCatalog {
    parts: Vec<Part>,
}

impl MemoryCatalog {
    /// Build a catalog from a fixed part list
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Part>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let terms: Vec<String> = filter.terms.iter().map(|t| t.to_lowercase()).collect();
        let reference = filter
            .reference_contains
            .as_ref()
            .map(|r| r.to_lowercase());

        let matches = self
            .parts
            .iter()
            .filter(|p| {
                let designation = p.designation.to_lowercase();
                let by_term = terms.iter().any(|t| designation.contains(t.as_str()));
                let by_reference = reference
                    .as_ref()
                    .map(|r| p.reference.to_lowercase().contains(r.as_str()))
                    .unwrap_or(false);
                by_term || by_reference
            })
            .cloned()
            .collect();

        Ok(matches)
    }
}

/// In-memory conversation store used in tests and embedded deployments
#[derive(Default)]
pub struct MemoryConversations {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryConversations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversations {
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append(&self, session_id: &str, message: ChatMessage) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            Part::new("55810M68K00", "AMORTISSEUR AV G SWIFT", 2, Some(210.0)),
            Part::new("55820M68K00", "AMORTISSEUR AV D SWIFT", 1, Some(210.0)),
            Part::new("13780M62S00", "FILTRE A AIR CELERIO", 6, Some(38.5)),
        ])
    }

    #[tokio::test]
    async fn test_filter_by_terms() {
        let catalog = fixture();
        let filter = CandidateFilter::for_terms(vec!["amortisseur".into()]);
        let parts = catalog.find_candidates(&filter).await.unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[tokio::test]
    async fn test_filter_by_reference() {
        let catalog = fixture();
        let filter = CandidateFilter::for_reference("13780m62s00");
        let parts = catalog.find_candidates(&filter).await.unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].designation, "FILTRE A AIR CELERIO");
    }

    #[tokio::test]
    async fn test_empty_filter_matches_nothing() {
        let catalog = fixture();
        let parts = catalog
            .find_candidates(&CandidateFilter::default())
            .await
            .unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let store = MemoryConversations::new();
        store
            .append("s1", ChatMessage::user("amortisseur"))
            .await
            .unwrap();
        store
            .append("s1", ChatMessage::assistant("Avant ou arrière ?"))
            .await
            .unwrap();

        let history = store.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(store.history("s2").await.unwrap().is_empty());
    }
}
