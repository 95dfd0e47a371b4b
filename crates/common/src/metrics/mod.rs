//! Metrics and observability utilities
//!
//! Provides metrics-rs series with standardized naming conventions.
//! The hosting service owns the exporter; the core only records.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all partsbot metrics
pub const METRICS_PREFIX: &str = "partsbot";

/// Histogram buckets for search latency (in seconds)
pub const SEARCH_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Search metrics
    describe_counter!(
        format!("{}_searches_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from search"
    );

    // Clarification metrics
    describe_counter!(
        format!("{}_clarifications_total", METRICS_PREFIX),
        Unit::Count,
        "Total clarification questions raised"
    );

    describe_counter!(
        format!("{}_clarifications_expired_total", METRICS_PREFIX),
        Unit::Count,
        "Pending clarifications dropped by the TTL sweep"
    );

    // Normalization metrics
    describe_counter!(
        format!("{}_dialect_fallback_total", METRICS_PREFIX),
        Unit::Count,
        "AI normalization calls that fell back to the static lexicon"
    );

    // Context cache metrics
    describe_counter!(
        format!("{}_context_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Session context cache hits"
    );

    describe_counter!(
        format!("{}_context_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Session context cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, path: &str, result_count: usize) {
    counter!(
        format!("{}_searches_total", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .record(duration_secs);

    metrics::gauge!(format!("{}_search_results_count", METRICS_PREFIX))
        .set(result_count as f64);
}

/// Helper to record a raised clarification
pub fn record_clarification(dimension: &str) {
    counter!(
        format!("{}_clarifications_total", METRICS_PREFIX),
        "dimension" => dimension.to_string()
    )
    .increment(1);
}

/// Timer handle for ad-hoc latency measurement
pub struct SearchTimer {
    start: Instant,
    path: &'static str,
}

impl SearchTimer {
    /// Start tracking a search
    pub fn start(path: &'static str) -> Self {
        Self {
            start: Instant::now(),
            path,
        }
    }

    /// Record search completion
    pub fn finish(self, result_count: usize) {
        record_search(self.start.elapsed().as_secs_f64(), self.path, result_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_records_without_recorder() {
        // No recorder installed: recording must be a no-op, not a panic
        let timer = SearchTimer::start("free_text");
        timer.finish(3);
        record_clarification("position");
    }
}
