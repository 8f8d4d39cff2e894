//! Environment-driven configuration for the demo runtime.

use anyhow::{Context, Result};

use crate::period::Period;

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbols: Vec<String>,
    pub target_period: Period,
    pub base_period: Option<Period>,
    pub portfolio_risk_budget: f64,
    pub default_risk_per_trade: f64,
    pub starting_equity: f64,
    pub ema_fast: u32,
    pub ema_slow: u32,
    pub atr_window: u32,
    pub atr_risk_mult: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub feed_candles: u32,
    pub feed_seed: u64,
}

impl Config {
    /// Read configuration from the environment. Period identifiers must
    /// parse — processing never starts with an invalid configuration.
    pub fn from_env() -> Result<Self> {
        let target_period: Period = std::env::var("TARGET_PERIOD")
            .unwrap_or_else(|_| "15MINUTE".to_string())
            .parse()
            .context("TARGET_PERIOD")?;
        let base_period = match std::env::var("BASE_PERIOD") {
            Ok(value) => Some(value.parse::<Period>().context("BASE_PERIOD")?),
            Err(_) => None,
        };

        Ok(Self {
            symbols: std::env::var("SYMBOLS")
                .unwrap_or_else(|_| "BTCUSDT,ETHUSDT".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            target_period,
            base_period,
            portfolio_risk_budget: env_f64("RISK_BUDGET", 100.0),
            default_risk_per_trade: env_f64("DEFAULT_RISK", 10.0),
            starting_equity: env_f64("STARTING_EQUITY", 10_000.0),
            ema_fast: env_u32("EMA_FAST", 6),
            ema_slow: env_u32("EMA_SLOW", 24),
            atr_window: env_u32("ATR_WINDOW", 14),
            atr_risk_mult: env_f64("ATR_RISK_MULT", 2.0),
            min_size: env_f64("MIN_SIZE", 0.0),
            max_size: env_f64("MAX_SIZE", 10.0),
            feed_candles: env_u32("FEED_CANDLES", 2_000),
            feed_seed: env_u64("FEED_SEED", 7),
        })
    }
}
