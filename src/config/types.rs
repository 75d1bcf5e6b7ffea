//! Configuration types

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::competitor::ResolverSettings;
use crate::execution::GuardSettings;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pricing gateway (eBay adapter service)
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Repricing engine tuning
    #[serde(default)]
    pub engine: EngineSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// HTTP pricing gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the pricing service
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_token: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Engine thresholds, limits and feature switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Per-item quiet period after an execution starts
    pub cooldown_seconds: i64,
    /// Window for suppressing identical execution records
    pub dedup_window_seconds: i64,
    /// Smallest price change worth pushing
    pub min_price_delta: Decimal,
    /// STAY_ABOVE snaps to the listing max when at least this far below it
    pub stay_above_snap_threshold: Decimal,
    /// Parallel items in a batch and parallel competitor refreshes
    pub max_concurrency: usize,
    /// Deadline for every collaborator call
    pub call_timeout_seconds: u64,
    pub refresh_competitor_prices: bool,
    pub live_search_enabled: bool,
    pub search_limit: u32,
    /// Entries kept in each strategy's execution history
    pub execution_history_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cooldown_seconds: 60,
            dedup_window_seconds: 120,
            min_price_delta: dec!(0.01),
            stay_above_snap_threshold: dec!(2.00),
            max_concurrency: 3,
            call_timeout_seconds: 15,
            refresh_competitor_prices: true,
            live_search_enabled: false,
            search_limit: 20,
            execution_history_limit: 50,
        }
    }
}

impl EngineSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            min_price_delta: self.min_price_delta,
            cooldown: ChronoDuration::seconds(self.cooldown_seconds.max(0)),
            dedup_window: ChronoDuration::seconds(self.dedup_window_seconds.max(0)),
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            refresh_manual_prices: self.refresh_competitor_prices,
            live_search_enabled: self.live_search_enabled,
            search_limit: self.search_limit,
            max_concurrency: self.max_concurrency.max(1),
            call_timeout: self.call_timeout(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let engine = EngineSettings::default();
        let guard = engine.guard_settings();
        assert_eq!(guard.cooldown, ChronoDuration::seconds(60));
        assert_eq!(guard.dedup_window, ChronoDuration::seconds(120));
        assert_eq!(guard.min_price_delta, dec!(0.01));

        let resolver = engine.resolver_settings();
        assert!(resolver.refresh_manual_prices);
        assert!(!resolver.live_search_enabled);
        assert_eq!(resolver.call_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_partial_engine_section_keeps_defaults() {
        let engine: EngineSettings =
            serde_json::from_str(r#"{"cooldown_seconds": 5, "live_search_enabled": true}"#).unwrap();
        assert_eq!(engine.cooldown_seconds, 5);
        assert!(engine.live_search_enabled);
        assert_eq!(engine.max_concurrency, 3);
    }
}
