//! Result selection: threshold, order, cap
//!
//! The minimum-score policy adapts to query shape: bare position/side
//! browsing is never starved, dialect queries get a relaxed threshold.

use crate::query::SearchContext;
use crate::scorer::ScoredPart;
use partsbot_common::config::SearchConfig;

/// Applies the minimum-score policy, deterministic ordering, and the
/// position-aware result caps.
pub struct ResultSelector {
    config: SearchConfig,
}

impl ResultSelector {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// The minimum score a candidate must reach for this query
    pub fn min_score(&self, ctx: &SearchContext) -> i64 {
        if ctx.bare_position {
            0
        } else if ctx.dialect_detected {
            self.config.min_score_dialect
        } else {
            self.config.min_score
        }
    }

    /// Threshold, sort, and cap the scored candidates
    pub fn select(&self, mut scored: Vec<ScoredPart>, ctx: &SearchContext) -> Vec<ScoredPart> {
        let min = self.min_score(ctx);
        scored.retain(|s| s.score >= min);

        sort_ranked(&mut scored);

        // Precision over recall once position is known
        let cap = if ctx.position.any() && scored.len() >= self.config.position_cap {
            self.config.position_cap
        } else if scored.len() >= self.config.result_cap {
            self.config.result_cap
        } else {
            self.config.max_results
        };
        scored.truncate(cap);

        scored
    }
}

/// Deterministic ordering: score desc, stock desc, reference asc.
/// The reference tie-break keeps reruns byte-identical.
pub fn sort_ranked(scored: &mut [ScoredPart]) {
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.part.stock.cmp(&a.part.stock))
            .then_with(|| a.part.reference.cmp(&b.part.reference))
    });
}
