//! Configuration management for the partsbot core
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Search pipeline configuration
    pub search: SearchConfig,

    /// Clarification state machine configuration
    pub clarification: ClarificationConfig,

    /// Session context tracker configuration
    pub context: ContextConfig,

    /// AI normalizer configuration
    pub normalizer: NormalizerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Minimum score for free-text queries
    #[serde(default = "default_min_score")]
    pub min_score: i64,

    /// Relaxed minimum score when dialect was detected
    #[serde(default = "default_min_score_dialect")]
    pub min_score_dialect: i64,

    /// Result cap when a position dimension was requested
    #[serde(default = "default_position_cap")]
    pub position_cap: usize,

    /// Default result cap
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,

    /// Absolute maximum results
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClarificationConfig {
    /// Pending clarification time-to-live in seconds
    #[serde(default = "default_clarification_ttl")]
    pub ttl_secs: u64,

    /// Sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    /// Session context cache time-to-live in seconds
    #[serde(default = "default_context_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NormalizerConfig {
    /// API base URL; absent means the AI normalizer is disabled
    pub api_base: Option<String>,

    /// API key for the normalization service
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_normalizer_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_normalizer_retries")]
    pub max_retries: u32,

    /// Minimum confidence to accept an AI result
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_min_score() -> i64 { 8 }
fn default_min_score_dialect() -> i64 { 5 }
fn default_position_cap() -> usize { 5 }
fn default_result_cap() -> usize { 10 }
fn default_max_results() -> usize { 15 }
fn default_clarification_ttl() -> u64 { 600 }
fn default_sweep_interval() -> u64 { 300 }
fn default_context_ttl() -> u64 { 300 }
fn default_normalizer_timeout() -> u64 { 10 }
fn default_normalizer_retries() -> u32 { 3 }
fn default_min_confidence() -> f32 { 0.6 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "partsbot".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        // Local .env overrides, ignored when absent
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("search.min_score", default_min_score())?
            .set_default("clarification.ttl_secs", default_clarification_ttl() as i64)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SEARCH__MIN_SCORE=10
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the clarification TTL as Duration
    pub fn clarification_ttl(&self) -> Duration {
        Duration::from_secs(self.clarification.ttl_secs)
    }

    /// Get the clarification sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.clarification.sweep_interval_secs)
    }

    /// Get the context cache TTL as Duration
    pub fn context_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.context.cache_ttl_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            clarification: ClarificationConfig::default(),
            context: ContextConfig::default(),
            normalizer: NormalizerConfig::default(),
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: default_json_logging(),
                service_name: default_service_name(),
            },
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            min_score_dialect: default_min_score_dialect(),
            position_cap: default_position_cap(),
            result_cap: default_result_cap(),
            max_results: default_max_results(),
        }
    }
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_clarification_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_context_ttl(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            timeout_secs: default_normalizer_timeout(),
            max_retries: default_normalizer_retries(),
            min_confidence: default_min_confidence(),
        }
    }
}

/// Initialize tracing from the observability configuration
pub fn init_tracing(config: &ObservabilityConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
