//! Configuration types loaded from YAML
//!
//! Every section has serde defaults so a minimal file only needs the API
//! base URL and the watched funds.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::rest::{RestPaths, CODE_PLACEHOLDER};
use crate::adapters::storage::DEFAULT_CACHE_RETENTION;
use crate::core::alarm::ResetPolicy;
use crate::core::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::core::intelligence::{IntelligenceFeedConfig, DEFAULT_HISTORY_LIMIT};
use crate::core::reconnect::{ReconnectPolicy, DEFAULT_RECONNECT_DELAY_SECS};
use crate::core::threshold::{DEFAULT_FALLBACK_THRESHOLD, MAX_HISTORY_WINDOW};
use crate::core::types::Instrument;
use crate::core::valuation::ValuationSettings;
use crate::error::AppError;

// ============================================================================
// Sections
// ============================================================================

/// Backend endpoints, relative to `base_url`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_intelligence_stream_path")]
    pub intelligence_stream_path: String,
    #[serde(default = "default_intelligence_history_path")]
    pub intelligence_history_path: String,
    /// Must contain `{code}`
    #[serde(default = "default_valuation_stream_path")]
    pub valuation_stream_path: String,
    /// Must contain `{code}`
    #[serde(default = "default_fund_history_path")]
    pub fund_history_path: String,
    /// Credential-store key of the bearer token
    #[serde(default = "default_token_key")]
    pub token_key: String,
}

/// Intelligence feed behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// JSON cache file; in-memory store when absent
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Most recent records kept by the durable store; older ones are evicted
    #[serde(default = "default_cache_retention")]
    pub cache_retention: usize,
    /// Idle time after which a silent stream counts as failed; off when absent
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,
}

/// Volatility alarm behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_fallback_threshold")]
    pub fallback_threshold: f64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default)]
    pub reset: ResetPolicy,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub funds: Vec<Instrument>,
}

fn default_intelligence_stream_path() -> String {
    "/api/v1/mobile/intelligence/stream".to_string()
}

fn default_intelligence_history_path() -> String {
    "/api/v1/mobile/intelligence".to_string()
}

fn default_valuation_stream_path() -> String {
    "/api/funds/{code}/valuation/stream".to_string()
}

fn default_fund_history_path() -> String {
    "/api/funds/{code}/history".to_string()
}

fn default_token_key() -> String {
    "access_token".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_reconnect_delay_secs() -> u64 {
    DEFAULT_RECONNECT_DELAY_SECS
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_cache_retention() -> usize {
    DEFAULT_CACHE_RETENTION
}

fn default_true() -> bool {
    true
}

fn default_fallback_threshold() -> f64 {
    DEFAULT_FALLBACK_THRESHOLD
}

fn default_history_window() -> usize {
    MAX_HISTORY_WINDOW
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            history_limit: default_history_limit(),
            cache_path: None,
            cache_retention: default_cache_retention(),
            stall_timeout_secs: None,
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_threshold: default_fallback_threshold(),
            history_window: default_history_window(),
            reset: ResetPolicy::default(),
            webhook_url: None,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ApiConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(AppError::Config("api.base_url cannot be empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "api.base_url must use http or https (got '{}')",
                base
            )));
        }

        for (name, path) in [
            ("valuation_stream_path", &self.valuation_stream_path),
            ("fund_history_path", &self.fund_history_path),
        ] {
            if !path.contains(CODE_PLACEHOLDER) {
                return Err(AppError::Config(format!(
                    "api.{} must contain the {} placeholder",
                    name, CODE_PLACEHOLDER
                )));
            }
        }
        Ok(())
    }

    /// Absolute URL of a path, which may itself already be absolute
    pub fn url(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), path)
    }

    pub fn rest_paths(&self) -> RestPaths {
        RestPaths {
            intelligence_history: self.intelligence_history_path.clone(),
            fund_history: self.fund_history_path.clone(),
        }
    }
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        self.api.validate()?;

        if self.feed.capacity == 0 {
            return Err(AppError::Config("feed.capacity must be > 0".to_string()));
        }
        if self.feed.cache_retention < self.feed.capacity {
            return Err(AppError::Config(format!(
                "feed.cache_retention must be >= feed.capacity (got {} < {})",
                self.feed.cache_retention, self.feed.capacity
            )));
        }
        if self.feed.reconnect_delay_secs == 0 {
            return Err(AppError::Config("feed.reconnect_delay_secs must be > 0".to_string()));
        }

        let fallback = self.alarm.fallback_threshold;
        if !fallback.is_finite() || fallback <= 0.0 {
            return Err(AppError::Config(format!(
                "alarm.fallback_threshold must be a positive number (got {})",
                fallback
            )));
        }
        if !(2..=MAX_HISTORY_WINDOW).contains(&self.alarm.history_window) {
            return Err(AppError::Config(format!(
                "alarm.history_window must be between 2 and {} (got {})",
                MAX_HISTORY_WINDOW, self.alarm.history_window
            )));
        }

        let mut seen = HashSet::new();
        for fund in &self.funds {
            if fund.code.trim().is_empty() {
                return Err(AppError::Config("Fund code cannot be empty".to_string()));
            }
            if !seen.insert(fund.code.as_str()) {
                return Err(AppError::Config(format!("Duplicate fund code '{}'", fund.code)));
            }
        }

        Ok(())
    }

    pub fn intelligence_feed_config(&self) -> IntelligenceFeedConfig {
        IntelligenceFeedConfig {
            endpoint: self.api.url(&self.api.intelligence_stream_path),
            token_key: self.api.token_key.clone(),
            capacity: self.feed.capacity,
            history_limit: self.feed.history_limit,
            reconnect: ReconnectPolicy::from_secs(self.feed.reconnect_delay_secs),
            stall_timeout: self.stall_timeout(),
        }
    }

    pub fn valuation_settings(&self) -> ValuationSettings {
        ValuationSettings {
            endpoint_template: self.api.url(&self.api.valuation_stream_path),
            token_key: self.api.token_key.clone(),
            reconnect: ReconnectPolicy::from_secs(self.feed.reconnect_delay_secs),
            stall_timeout: self.stall_timeout(),
            history_window: self.alarm.history_window,
            fallback_threshold: self.alarm.fallback_threshold,
            alarm_enabled: self.alarm.enabled,
            reset: self.alarm.reset,
        }
    }

    fn stall_timeout(&self) -> Option<Duration> {
        self.feed
            .stall_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
