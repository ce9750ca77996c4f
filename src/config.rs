use std::path::Path;

use serde::Deserialize;

use crate::error::BotError;
use crate::strategy::{EmaCrossStrategy, MacdCrossStrategy, Strategy, WaveStrategy};
use crate::Result;

const KRAKEN_API_BASE: &str = "https://api.kraken.com";

/// Top-level bot configuration, loaded from an optional `wavebot.toml`
/// plus `WAVEBOT_`-prefixed environment overrides. API credentials come
/// from the environment only and never live in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Base-asset volume per market order.
    pub trade_volume: f64,
    /// Taker fee fraction used for position valuation (0.004 = 0.4%).
    pub fee_rate: f64,
    pub exchange: ExchangeConfig,
    pub backoff: BackoffConfig,
    pub loops: Vec<LoopConfig>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trade_volume: 0.05,
            fee_rate: 0.004,
            exchange: ExchangeConfig::default(),
            backoff: BackoffConfig::default(),
            loops: vec![LoopConfig::default()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    /// Bounds every exchange call, and with it shutdown latency.
    pub timeout_secs: u64,
    pub private_calls_per_second: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: KRAKEN_API_BASE.to_string(),
            timeout_secs: 15,
            private_calls_per_second: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_secs: u64,
    pub max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_secs: 5,
            max_secs: 60,
        }
    }
}

/// One independent polling loop: a (pair, interval, strategy) unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub pair: String,
    /// Base asset symbol as it appears in balance keys.
    pub base: String,
    pub interval_minutes: u32,
    pub strategy: StrategyConfig,
    pub cadence: CadenceConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            pair: "SOLUSD".to_string(),
            base: "SOL".to_string(),
            interval_minutes: 1,
            strategy: StrategyConfig::default(),
            cadence: CadenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    EmaCross {
        short_span: usize,
        long_span: usize,
    },
    MacdCross,
    Wave {
        level: usize,
        prominence: f64,
        distance: usize,
        signal_delay: usize,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Wave {
            level: 1,
            prominence: 1.1,
            distance: 10,
            signal_delay: 0,
        }
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn Strategy> {
        match *self {
            StrategyConfig::EmaCross {
                short_span,
                long_span,
            } => Box::new(EmaCrossStrategy::new(short_span, long_span)),
            StrategyConfig::MacdCross => Box::new(MacdCrossStrategy),
            StrategyConfig::Wave {
                level,
                prominence,
                distance,
                signal_delay,
            } => Box::new(WaveStrategy::new(level, prominence, distance, signal_delay)),
        }
    }
}

/// When the next cycle starts after the current one finishes.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CadenceConfig {
    /// Fixed delay between cycles.
    Fixed { secs: u64 },
    /// Wall-clock aligned: `offset_secs` past every `period_secs` UTC
    /// boundary (e.g. 5 seconds past each minute).
    Aligned { period_secs: u64, offset_secs: u64 },
}

impl Default for CadenceConfig {
    fn default() -> Self {
        CadenceConfig::Fixed { secs: 3 }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

pub fn credentials_from_env() -> Result<Credentials> {
    let api_key = std::env::var("KRAKEN_API_KEY")
        .map_err(|_| BotError::Config("KRAKEN_API_KEY not set".into()))?;
    let api_secret = std::env::var("KRAKEN_API_SECRET")
        .map_err(|_| BotError::Config("KRAKEN_API_SECRET not set".into()))?;
    Ok(Credentials {
        api_key,
        api_secret,
    })
}

/// Load configuration: explicit file if given, otherwise an optional
/// `wavebot.toml` in the working directory, then environment overrides.
pub fn load(path: Option<&Path>) -> Result<BotConfig> {
    let mut builder = config::Config::builder();
    builder = match path {
        Some(file) => builder.add_source(config::File::from(file)),
        None => builder.add_source(config::File::with_name("wavebot").required(false)),
    };

    let settings = builder
        .add_source(config::Environment::with_prefix("WAVEBOT").separator("__"))
        .build()
        .map_err(|e| BotError::Config(e.to_string()))?;

    settings
        .try_deserialize()
        .map_err(|e| BotError::Config(e.to_string()))
}
