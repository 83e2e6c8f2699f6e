use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::psp::PspConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen_addr: String,
    pub currency: String,
    pub log_format: LogFormat,
    pub provider: PspConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            currency: "usd".to_string(),
            log_format: LogFormat::Pretty,
            provider: PspConfig::default(),
        }
    }
}

fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PAYMENT_RELAY_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("payment-relay")
        .join("config.json")
}

/// Defaults, then the JSON config file if one exists, then the environment.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let config = if path.exists() {
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))?
    } else {
        AppConfig::default()
    };

    apply_env(config, |key| std::env::var(key).ok())
}

pub fn apply_env<F>(mut config: AppConfig, var: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = var("PAYMENT_RELAY_LISTEN_ADDR") {
        config.listen_addr = addr;
    }
    if let Some(currency) = var("PAYMENT_RELAY_CURRENCY") {
        config.currency = currency.to_lowercase();
    }
    if let Some(format) = var("PAYMENT_RELAY_LOG_FORMAT") {
        config.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => anyhow::bail!("Unknown log format: {}", other),
        };
    }
    if let Some(provider) = var("PAYMENT_RELAY_PROVIDER") {
        config.provider.provider = provider;
    }
    if let Some(key) = var("PAYMENT_RELAY_API_KEY").or_else(|| var("STRIPE_API_KEY")) {
        config.provider.api_key = key;
    }
    if let Some(base) = var("PAYMENT_RELAY_API_BASE") {
        config.provider.api_base = base;
    }
    if let Some(source) = var("PAYMENT_RELAY_CUSTOMER_SOURCE") {
        config.provider.customer_source = Some(source).filter(|s| !s.is_empty());
    }
    if let Some(timeout) = var("PAYMENT_RELAY_TIMEOUT_SECS") {
        config.provider.timeout_secs = timeout
            .parse()
            .with_context(|| format!("PAYMENT_RELAY_TIMEOUT_SECS is not a number: {}", timeout))?;
    }

    if config.currency.len() != 3 {
        anyhow::bail!("Currency must be a three-letter ISO code, got '{}'", config.currency);
    }

    Ok(config)
}
