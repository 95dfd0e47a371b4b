//! PartsBot Search Pipeline
//!
//! Turns a raw user message into a ranked part list:
//! - Synonym index (dialect-aware, built once at startup)
//! - Query classification (reference codes, position/side, vehicle model)
//! - Additive relevance scoring over catalog candidates
//! - Threshold and cap selection

mod engine;
mod query;
mod scorer;
mod selector;
mod synonyms;

pub use engine::{SearchEngine, SearchOutcome};
pub use query::{detect_model, PositionPatterns, PositionRequirements, QueryClassifier, SearchContext};
pub use scorer::{ScoreWeights, ScoredPart, Scorer};
pub use selector::ResultSelector;
pub use synonyms::SynonymIndex;
