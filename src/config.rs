//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Paths and secrets may be overridden by environment variables resolved
//! at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub platform: PlatformConfig,
    pub betting: BettingConfig,
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    pub name: String,
    /// Virtual balance granted to every freshly registered wallet.
    pub signup_balance: Decimal,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BettingConfig {
    pub min_bet_amount: Decimal,
    pub default_odds: Decimal,
    /// Upper bound on the auto-close timer a streamer may request.
    pub max_window_minutes: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    /// Verdicts below this confidence go to manual confirmation.
    pub result_confidence_threshold: f64,
    /// Fraud flags below this confidence are ignored.
    pub fraud_confidence_threshold: f64,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub state_file: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig {
                name: "STREAMBET".to_string(),
                signup_balance: dec!(100),
                currency: "credits".to_string(),
            },
            betting: BettingConfig {
                min_bet_amount: dec!(1),
                default_odds: dec!(2.0),
                max_window_minutes: 120,
            },
            oracle: OracleConfig {
                result_confidence_threshold: 0.8,
                fraud_confidence_threshold: 0.9,
                timeout_secs: 30,
            },
            storage: StorageConfig {
                state_file: "streambet_state.json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.oracle.result_confidence_threshold, 0.8);
        assert_eq!(cfg.oracle.fraud_confidence_threshold, 0.9);
        assert_eq!(cfg.betting.default_odds, dec!(2.0));
        assert_eq!(cfg.platform.signup_balance, dec!(100));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [platform]
            name = "STREAMBET"
            signup_balance = 100.0
            currency = "credits"

            [betting]
            min_bet_amount = 1.0
            default_odds = 2.0
            max_window_minutes = 60

            [oracle]
            result_confidence_threshold = 0.8
            fraud_confidence_threshold = 0.9
            timeout_secs = 15

            [storage]
            state_file = "state.json"
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.platform.name, "STREAMBET");
        assert_eq!(cfg.betting.max_window_minutes, 60);
        assert_eq!(cfg.oracle.timeout_secs, 15);
        assert_eq!(cfg.storage.state_file, "state.json");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = AppConfig::load("/tmp/streambet_no_such_config_12345.toml");
        assert!(result.is_err());
    }
}
