use serde_json::{json, Map};

use super::{Evaluation, Strategy};
use crate::error::BotError;
use crate::indicators::macd;
use crate::models::{CandleSeries, Signal};
use crate::Result;

/// MACD crossover strategy.
///
/// Buy while the histogram is positive, Sell otherwise. Two-valued by
/// construction: this strategy never emits Hold, mirroring its binary
/// 0/1 position convention.
#[derive(Debug, Clone, Default)]
pub struct MacdCrossStrategy;

impl Strategy for MacdCrossStrategy {
    fn evaluate(&self, series: &CandleSeries) -> Result<Evaluation> {
        if series.len() < self.min_candles() {
            return Err(BotError::InsufficientData {
                have: series.len(),
                need: self.min_candles(),
            });
        }

        let closes = series.closes();
        let output = macd(&closes);

        let signals: Vec<Signal> = output
            .histogram
            .iter()
            .map(|&h| if h > 0.0 { Signal::Buy } else { Signal::Sell })
            .collect();

        let last = signals.len() - 1;
        let mut metadata = Map::new();
        metadata.insert("macd".into(), json!(output.macd_line[last]));
        metadata.insert("signal".into(), json!(output.signal_line[last]));
        metadata.insert("histogram".into(), json!(output.histogram[last]));
        metadata.insert("position".into(), json!(output.position[last]));

        Ok(Evaluation::from_signals(signals, metadata))
    }

    fn name(&self) -> &str {
        "MacdCrossStrategy"
    }

    fn min_candles(&self) -> usize {
        // Slow EMA window plus the signal smoothing window.
        26 + 9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;
    use chrono::{TimeZone, Utc};

    fn series_from_closes(closes: &[f64]) -> CandleSeries {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: Utc.timestamp_opt(60 * (i as i64 + 1), 0).unwrap(),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                vwap: close,
                volume: 10.0,
                trade_count: 5,
            })
            .collect();
        CandleSeries::new("SOLUSD", 1, candles).unwrap()
    }

    #[test]
    fn test_never_emits_hold() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 8.0)
            .collect();
        let series = series_from_closes(&closes);
        let evaluation = MacdCrossStrategy.evaluate(&series).unwrap();

        assert_eq!(evaluation.signals.len(), series.len());
        assert!(evaluation.signals.iter().all(Signal::is_actionable));
    }

    #[test]
    fn test_uptrend_is_buy() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 0.5).collect();
        let series = series_from_closes(&closes);
        let evaluation = MacdCrossStrategy.evaluate(&series).unwrap();
        assert_eq!(evaluation.signal, Signal::Buy);
        assert_eq!(evaluation.metadata["position"], serde_json::json!(1));
    }

    #[test]
    fn test_downtrend_is_sell() {
        let closes: Vec<f64> = (0..80).map(|i| 200.0 - i as f64 * 0.5).collect();
        let series = series_from_closes(&closes);
        let evaluation = MacdCrossStrategy.evaluate(&series).unwrap();
        assert_eq!(evaluation.signal, Signal::Sell);
    }

    #[test]
    fn test_insufficient_data() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        assert!(matches!(
            MacdCrossStrategy.evaluate(&series),
            Err(BotError::InsufficientData { .. })
        ));
    }
}
