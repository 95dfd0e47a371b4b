//! PartsBot Common Library
//!
//! Shared code for the partsbot crates including:
//! - Domain models (parts, chat messages)
//! - Catalog and conversation store contracts
//! - Text canonicalization
//! - AI/dialect normalization capability
//! - Error types and handling
//! - Configuration management
//! - Metrics registration

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod store;
pub mod text;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{ChatMessage, MessageRole, Part};
pub use store::{CandidateFilter, CatalogStore, ConversationStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
