/// Exponentially weighted moving average over a full series.
///
/// Smoothing factor α = 2 / (span + 1). The first output is seeded with
/// the first input value, so the result uses no look-ahead and has the
/// same length as the input.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);

    for &value in &values[1..] {
        ema = alpha * value + (1.0 - alpha) * ema;
        out.push(ema);
    }

    out
}
