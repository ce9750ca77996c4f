use crate::error::BotError;
use crate::Result;

const SQRT_2: f64 = std::f64::consts::SQRT_2;
/// Detail coefficients are soft-thresholded at this fraction of the
/// largest absolute coefficient of their level.
const THRESHOLD_SCALE: f64 = 0.05;

/// Multi-level Haar decomposition of a signal.
///
/// `details` and `lens` are stored finest level first; `lens` records the
/// pre-padding input length of each analysis step so reconstruction can
/// restore the exact original length.
struct Decomposition {
    approx: Vec<f64>,
    details: Vec<Vec<f64>>,
    lens: Vec<usize>,
}

/// Wavelet-denoise a close-price series.
///
/// Haar decomposition to `level`, soft-thresholding every detail level at
/// `0.05 x max(|coefficient|)`, then reconstruction truncated back to the
/// input length.
pub fn denoise(values: &[f64], level: usize) -> Result<Vec<f64>> {
    denoise_with_scale(values, level, THRESHOLD_SCALE)
}

fn denoise_with_scale(values: &[f64], level: usize, scale: f64) -> Result<Vec<f64>> {
    if level == 0 {
        return Err(BotError::Data("wavelet level must be at least 1".into()));
    }
    let need = 1usize << level;
    if values.len() < need {
        return Err(BotError::InsufficientData {
            have: values.len(),
            need,
        });
    }

    let mut decomposition = decompose(values, level);
    for detail in &mut decomposition.details {
        let max_abs = detail.iter().fold(0.0f64, |max, &c| max.max(c.abs()));
        let threshold = scale * max_abs;
        for coefficient in detail.iter_mut() {
            *coefficient = soft_threshold(*coefficient, threshold);
        }
    }

    Ok(reconstruct(decomposition))
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

fn decompose(values: &[f64], level: usize) -> Decomposition {
    let mut approx = values.to_vec();
    let mut details = Vec::with_capacity(level);
    let mut lens = Vec::with_capacity(level);

    for _ in 0..level {
        lens.push(approx.len());
        let (next_approx, detail) = analysis_step(&approx);
        details.push(detail);
        approx = next_approx;
    }

    Decomposition {
        approx,
        details,
        lens,
    }
}

fn reconstruct(decomposition: Decomposition) -> Vec<f64> {
    let Decomposition {
        mut approx,
        details,
        lens,
    } = decomposition;

    for (detail, len) in details.iter().zip(&lens).rev() {
        let mut signal = synthesis_step(&approx, detail);
        signal.truncate(*len);
        approx = signal;
    }

    approx
}

/// One orthonormal Haar analysis step. Odd-length inputs are padded by
/// repeating the final sample; `reconstruct` truncates the extra sample
/// away using the recorded length.
fn analysis_step(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut padded;
    let signal = if signal.len() % 2 == 1 {
        padded = signal.to_vec();
        padded.push(*signal.last().expect("non-empty signal"));
        &padded[..]
    } else {
        signal
    };

    let half = signal.len() / 2;
    let mut approx = Vec::with_capacity(half);
    let mut detail = Vec::with_capacity(half);
    for pair in signal.chunks_exact(2) {
        approx.push((pair[0] + pair[1]) / SQRT_2);
        detail.push((pair[0] - pair[1]) / SQRT_2);
    }

    (approx, detail)
}

fn synthesis_step(approx: &[f64], detail: &[f64]) -> Vec<f64> {
    let mut signal = Vec::with_capacity(approx.len() * 2);
    for (a, d) in approx.iter().zip(detail) {
        signal.push((a + d) / SQRT_2);
        signal.push((a - d) / SQRT_2);
    }
    signal
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy_ramp(len: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..len)
            .map(|i| 100.0 + i as f64 * 0.5 + rng.gen_range(-1.0..1.0))
            .collect()
    }

    #[test]
    fn test_zero_threshold_reproduces_input() {
        let values = noisy_ramp(64);
        let out = denoise_with_scale(&values, 3, 0.0).unwrap();
        assert_eq!(out.len(), values.len());
        for (a, b) in out.iter().zip(&values) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
    }

    #[test]
    fn test_output_length_preserved_for_odd_input() {
        for len in [31, 33, 57, 101] {
            let values = noisy_ramp(len);
            let out = denoise(&values, 2).unwrap();
            assert_eq!(out.len(), len, "length {len}");
        }
    }

    #[test]
    fn test_output_length_preserved_for_even_input() {
        let values = noisy_ramp(96);
        assert_eq!(denoise(&values, 3).unwrap().len(), 96);
    }

    #[test]
    fn test_denoise_reduces_noise_energy() {
        // Slow linear trend, so detail coefficients are noise-dominated.
        let clean: Vec<f64> = (0..128).map(|i| 100.0 + i as f64 * 0.05).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let noisy: Vec<f64> = clean.iter().map(|v| v + rng.gen_range(-0.5..0.5)).collect();

        let denoised = denoise(&noisy, 1).unwrap();
        let noisy_err: f64 = noisy.iter().zip(&clean).map(|(a, b)| (a - b).powi(2)).sum();
        let denoised_err: f64 = denoised.iter().zip(&clean).map(|(a, b)| (a - b).powi(2)).sum();
        assert!(denoised_err < noisy_err);
    }

    #[test]
    fn test_short_series_rejected() {
        let values = vec![1.0, 2.0, 3.0];
        let result = denoise(&values, 2);
        assert!(matches!(
            result,
            Err(BotError::InsufficientData { have: 3, need: 4 })
        ));
    }

    #[test]
    fn test_level_zero_rejected() {
        assert!(denoise(&[1.0, 2.0], 0).is_err());
    }
}
