use crate::models::{Signal, SignalState};

/// Per-loop memory of the last non-zero signal.
///
/// Owned exclusively by one coordinator loop; cycles within a loop run
/// strictly sequentially, so no synchronization is needed.
#[derive(Debug, Default)]
pub struct SignalTracker {
    state: SignalState,
}

impl SignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SignalState {
        &self.state
    }

    /// Fold a fresh per-candle signal sequence into the tracked state.
    ///
    /// A single reverse walk finds the last non-zero entry. When the whole
    /// sequence is Hold, the standing non-zero fields are kept and the
    /// period counter advances by the number of Hold candles seen; a flat
    /// interval must not erase the active directional bias.
    pub fn update(&mut self, signals: &[Signal], closes: &[f64]) -> &SignalState {
        debug_assert_eq!(signals.len(), closes.len());

        self.state.last_signal = signals.last().copied().unwrap_or(Signal::Hold);

        match signals.iter().rposition(Signal::is_actionable) {
            Some(index) => {
                self.state.last_non_zero = Some(signals[index]);
                self.state.last_non_zero_price = closes.get(index).copied();
                self.state.periods_since_non_zero = Some((signals.len() - 1 - index) as u32);
            }
            None => {
                if let Some(periods) = self.state.periods_since_non_zero {
                    self.state.periods_since_non_zero = Some(periods + signals.len() as u32);
                }
            }
        }

        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_with_signal() {
        let mut tracker = SignalTracker::new();
        let signals = vec![Signal::Hold, Signal::Buy, Signal::Hold, Signal::Hold];
        let closes = vec![100.0, 99.0, 101.0, 102.0];

        let state = tracker.update(&signals, &closes);
        assert_eq!(state.last_signal, Signal::Hold);
        assert_eq!(state.last_non_zero, Some(Signal::Buy));
        assert_eq!(state.last_non_zero_price, Some(99.0));
        assert_eq!(state.periods_since_non_zero, Some(2));
    }

    #[test]
    fn test_all_hold_cycle_preserves_bias_and_advances_periods() {
        let mut tracker = SignalTracker::new();
        tracker.update(&[Signal::Hold, Signal::Sell], &[100.0, 103.0]);

        let holds = vec![Signal::Hold; 5];
        let closes = vec![104.0; 5];
        let state = tracker.update(&holds, &closes);

        assert_eq!(state.last_signal, Signal::Hold);
        assert_eq!(state.last_non_zero, Some(Signal::Sell));
        assert_eq!(state.last_non_zero_price, Some(103.0));
        // 0 periods after the Sell fired, plus exactly 5 Hold candles.
        assert_eq!(state.periods_since_non_zero, Some(5));
    }

    #[test]
    fn test_all_hold_before_any_signal_stays_unset() {
        let mut tracker = SignalTracker::new();
        let state = tracker.update(&[Signal::Hold, Signal::Hold], &[100.0, 101.0]);
        assert_eq!(state.last_non_zero, None);
        assert_eq!(state.last_non_zero_price, None);
        assert_eq!(state.periods_since_non_zero, None);
    }

    #[test]
    fn test_new_signal_overwrites_bias() {
        let mut tracker = SignalTracker::new();
        tracker.update(&[Signal::Buy, Signal::Hold], &[100.0, 101.0]);
        let state = tracker.update(&[Signal::Hold, Signal::Sell], &[102.0, 103.0]);

        assert_eq!(state.last_signal, Signal::Sell);
        assert_eq!(state.last_non_zero, Some(Signal::Sell));
        assert_eq!(state.last_non_zero_price, Some(103.0));
        assert_eq!(state.periods_since_non_zero, Some(0));
    }

    #[test]
    fn test_latest_non_zero_wins_within_sequence() {
        let mut tracker = SignalTracker::new();
        let signals = vec![Signal::Buy, Signal::Sell, Signal::Buy, Signal::Hold];
        let closes = vec![100.0, 105.0, 95.0, 96.0];
        let state = tracker.update(&signals, &closes);

        assert_eq!(state.last_non_zero, Some(Signal::Buy));
        assert_eq!(state.last_non_zero_price, Some(95.0));
        assert_eq!(state.periods_since_non_zero, Some(1));
    }
}
