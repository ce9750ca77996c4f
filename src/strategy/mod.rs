// Trading strategy module
pub mod ema_cross;
pub mod macd_cross;
pub mod wave;

pub use ema_cross::EmaCrossStrategy;
pub use macd_cross::MacdCrossStrategy;
pub use wave::WaveStrategy;

use serde_json::{Map, Value};

use crate::models::{CandleSeries, Signal};
use crate::Result;

/// One strategy evaluation over a full candle series.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Per-candle directional signals, same length as the input series.
    pub signals: Vec<Signal>,
    /// Index of the candle the headline signal belongs to (the last one).
    pub signal_index: usize,
    /// Signal at `signal_index`.
    pub signal: Signal,
    /// Strategy-specific extras (EMA values, crossover flags, ...).
    pub metadata: Map<String, Value>,
}

impl Evaluation {
    /// Build an evaluation from a non-empty per-candle signal sequence.
    pub fn from_signals(signals: Vec<Signal>, metadata: Map<String, Value>) -> Self {
        let signal_index = signals.len().saturating_sub(1);
        let signal = signals.last().copied().unwrap_or(Signal::Hold);
        Self {
            signals,
            signal_index,
            signal,
            metadata,
        }
    }
}

/// Base trait for all trading strategies.
pub trait Strategy: Send + Sync {
    /// Evaluate a candle series into per-candle signals plus metadata.
    fn evaluate(&self, series: &CandleSeries) -> Result<Evaluation>;

    /// Get strategy name.
    fn name(&self) -> &str;

    /// Minimum candles required for a meaningful evaluation.
    fn min_candles(&self) -> usize;
}
