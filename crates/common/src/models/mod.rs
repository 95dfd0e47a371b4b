//! Domain models shared by the partsbot crates
//!
//! The catalog owns parts; the core only ever sees immutable read
//! snapshots fetched per query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog part as returned by the catalog store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Catalog reference code (catalog-unique-ish)
    pub reference: String,

    /// Designation text; carries the model tag implicitly
    pub designation: String,

    /// Units in stock
    pub stock: u32,

    /// Unit price, absent when not published
    pub unit_price: Option<f64>,
}

impl Part {
    /// Convenience constructor used heavily in tests
    pub fn new(reference: &str, designation: &str, stock: u32, unit_price: Option<f64>) -> Self {
        Self {
            reference: reference.to_string(),
            designation: designation.to_string(),
            stock,
            unit_price,
        }
    }

    /// Whether the part can be sold right now
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Sender role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single conversation turn as stored by the conversation store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender role
    pub role: MessageRole,

    /// Message text
    pub content: String,

    /// When the message was recorded
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a user message stamped now
    pub fn user(content: &str) -> Self {
        Self {
            role: MessageRole::User,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Build an assistant message stamped now
    pub fn assistant(content: &str) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}
