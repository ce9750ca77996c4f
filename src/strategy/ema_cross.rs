use serde_json::{json, Map};

use super::{Evaluation, Strategy};
use crate::error::BotError;
use crate::indicators::ema_series;
use crate::models::{CandleSeries, Signal};
use crate::Result;

/// EMA crossover strategy.
///
/// Buy while the short EMA sits above the long EMA, Sell otherwise, a
/// binary position, re-asserted at every candle. The `execute_order`
/// metadata flag marks the candle where the position actually flipped;
/// three identical trailing positions mean no flip and no flag.
#[derive(Debug, Clone)]
pub struct EmaCrossStrategy {
    pub short_span: usize,
    pub long_span: usize,
}

impl EmaCrossStrategy {
    pub fn new(short_span: usize, long_span: usize) -> Self {
        Self {
            short_span,
            long_span,
        }
    }
}

impl Default for EmaCrossStrategy {
    fn default() -> Self {
        Self::new(12, 26)
    }
}

impl Strategy for EmaCrossStrategy {
    fn evaluate(&self, series: &CandleSeries) -> Result<Evaluation> {
        if series.len() < self.min_candles() {
            return Err(BotError::InsufficientData {
                have: series.len(),
                need: self.min_candles(),
            });
        }

        let closes = series.closes();
        let short = ema_series(&closes, self.short_span);
        let long = ema_series(&closes, self.long_span);

        let signals: Vec<Signal> = short
            .iter()
            .zip(&long)
            .map(|(s, l)| if s > l { Signal::Buy } else { Signal::Sell })
            .collect();

        let last = signals.len() - 1;
        let execute_order = signals[last] != signals[last - 1];

        let mut metadata = Map::new();
        metadata.insert("short_ema".into(), json!(short[last]));
        metadata.insert("long_ema".into(), json!(long[last]));
        metadata.insert("execute_order".into(), json!(execute_order));

        Ok(Evaluation::from_signals(signals, metadata))
    }

    fn name(&self) -> &str {
        "EmaCrossStrategy"
    }

    fn min_candles(&self) -> usize {
        self.long_span.max(self.short_span).max(2)
    }
}
