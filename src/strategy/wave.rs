use serde_json::{json, Map};

use super::{Evaluation, Strategy};
use crate::error::BotError;
use crate::indicators::{denoise, find_extrema};
use crate::models::{CandleSeries, Signal};
use crate::Result;

/// Wavelet peak/valley strategy.
///
/// Denoises the close series, then marks each detected valley as a Buy
/// candle and each peak as a Sell candle; everything else is Hold. With
/// `signal_delay > 0` the whole signal sequence is shifted forward to
/// emulate execution lag before it is read.
#[derive(Debug, Clone)]
pub struct WaveStrategy {
    pub level: usize,
    pub prominence: f64,
    pub distance: usize,
    pub signal_delay: usize,
}

impl WaveStrategy {
    pub fn new(level: usize, prominence: f64, distance: usize, signal_delay: usize) -> Self {
        Self {
            level,
            prominence,
            distance,
            signal_delay,
        }
    }
}

impl Default for WaveStrategy {
    fn default() -> Self {
        // Production parameters for the 1-minute SOLUSD loop.
        Self::new(1, 1.1, 10, 0)
    }
}

impl Strategy for WaveStrategy {
    fn evaluate(&self, series: &CandleSeries) -> Result<Evaluation> {
        if series.len() < self.min_candles() {
            return Err(BotError::InsufficientData {
                have: series.len(),
                need: self.min_candles(),
            });
        }

        let closes = series.closes();
        let denoised = denoise(&closes, self.level)?;
        let extrema = find_extrema(&denoised, self.prominence, self.distance);

        let mut signals = vec![Signal::Hold; closes.len()];
        for &valley in &extrema.valleys {
            signals[valley] = Signal::Buy;
        }
        for &peak in &extrema.peaks {
            signals[peak] = Signal::Sell;
        }

        if self.signal_delay > 0 {
            let keep = signals.len().saturating_sub(self.signal_delay);
            signals.truncate(keep);
            signals.splice(0..0, std::iter::repeat(Signal::Hold).take(self.signal_delay));
        }

        let mut metadata = Map::new();
        metadata.insert("peaks".into(), json!(extrema.peaks.len()));
        metadata.insert("valleys".into(), json!(extrema.valleys.len()));
        metadata.insert(
            "denoised_close".into(),
            json!(denoised.last().copied().unwrap_or_default()),
        );

        Ok(Evaluation::from_signals(signals, metadata))
    }

    fn name(&self) -> &str {
        "WaveStrategy"
    }

    fn min_candles(&self) -> usize {
        (1usize << self.level).max(self.distance + 1)
    }
}
