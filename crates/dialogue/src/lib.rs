//! PartsBot Dialogue Layer
//!
//! Multi-turn machinery on top of the search pipeline:
//! - Clarification state machine (per-session pending questions, TTL sweep)
//! - Session context tracker (topic history, follow-up query building)
//! - Orchestrator (sequences one message end to end)

mod clarification;
mod context;
mod orchestrator;

pub use clarification::{
    AnswerOutcome, ClarificationContext, ClarificationManager, Dimension, PendingQuestion,
};
pub use context::{ContextTracker, SessionContext};
pub use orchestrator::{ChatOutcome, Intent, Orchestrator};
