//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::{AppConfig, AppSettings, EngineSettings, GatewayConfig};
use crate::common::errors::{RepricerError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (`REPRICER__ENGINE__COOLDOWN_SECONDS=30`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("REPRICER")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| RepricerError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| RepricerError::Configuration(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let defaults = GatewayConfig::default();
    let request_timeout_seconds = match std::env::var("REPRICER_GATEWAY_TIMEOUT_SECONDS") {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            RepricerError::Configuration(format!("invalid REPRICER_GATEWAY_TIMEOUT_SECONDS: {}", raw))
        })?,
        Err(_) => defaults.request_timeout_seconds,
    };

    let gateway = GatewayConfig {
        base_url: std::env::var("REPRICER_GATEWAY_URL").unwrap_or(defaults.base_url),
        api_token: std::env::var("REPRICER_GATEWAY_TOKEN").ok().filter(|t| !t.is_empty()),
        request_timeout_seconds,
    };

    let settings = AppSettings {
        log_level: std::env::var("REPRICER_LOG_LEVEL").unwrap_or_else(|_| AppSettings::default().log_level),
    };

    Ok(AppConfig {
        gateway,
        engine: EngineSettings::default(),
        settings,
    })
}
