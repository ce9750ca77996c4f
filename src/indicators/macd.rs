use super::ema::ema_series;

const FAST_SPAN: usize = 12;
const SLOW_SPAN: usize = 26;
const SIGNAL_SPAN: usize = 9;

/// MACD decomposition of a close-price series.
#[derive(Debug, Clone)]
pub struct Macd {
    /// EMA(close, 12) - EMA(close, 26).
    pub macd_line: Vec<f64>,
    /// EMA(macd_line, 9).
    pub signal_line: Vec<f64>,
    /// macd_line - signal_line.
    pub histogram: Vec<f64>,
    /// 1 where the MACD line is above its signal line, 0 otherwise
    /// (binary hold/long convention, not -1/0/+1).
    pub position: Vec<u8>,
}

pub fn macd(closes: &[f64]) -> Macd {
    let fast = ema_series(closes, FAST_SPAN);
    let slow = ema_series(closes, SLOW_SPAN);

    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal_line = ema_series(&macd_line, SIGNAL_SPAN);
    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();
    let position = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| u8::from(m > s))
        .collect();

    Macd {
        macd_line,
        signal_line,
        histogram,
        position,
    }
}
