use std::cmp::Ordering;

/// Indices of accepted peaks and valleys in a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extrema {
    pub peaks: Vec<usize>,
    pub valleys: Vec<usize>,
}

/// Locate peaks and valleys of a signal.
///
/// A peak is a local maximum whose prominence is at least `prominence`
/// and which lies at least `min_distance` samples from any other accepted
/// peak; valleys are peaks of the negated signal. The distance filter
/// runs before the prominence filter (taller peaks win the exclusion
/// window, earliest index wins ties), so raising the prominence can only
/// ever shrink the result.
pub fn find_extrema(signal: &[f64], prominence: f64, min_distance: usize) -> Extrema {
    let negated: Vec<f64> = signal.iter().map(|v| -v).collect();
    Extrema {
        peaks: find_peaks(signal, prominence, min_distance),
        valleys: find_peaks(&negated, prominence, min_distance),
    }
}

fn find_peaks(signal: &[f64], prominence: f64, min_distance: usize) -> Vec<usize> {
    let candidates = local_maxima(signal);
    let spaced = enforce_distance(signal, &candidates, min_distance);
    spaced
        .into_iter()
        .filter(|&peak| peak_prominence(signal, peak) >= prominence)
        .collect()
}

/// Interior local maxima; a plateau resolves to its earliest sample.
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    while i < n - 1 {
        if signal[i - 1] < signal[i] {
            let mut j = i;
            while j + 1 < n && signal[j + 1] == signal[i] {
                j += 1;
            }
            if j + 1 < n && signal[j + 1] < signal[i] {
                peaks.push(i);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    peaks
}

/// Keep only peaks separated by at least `min_distance` samples. Peaks
/// are granted their exclusion window in height order, earliest index
/// first on equal heights.
fn enforce_distance(signal: &[f64], peaks: &[usize], min_distance: usize) -> Vec<usize> {
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        signal[peaks[b]]
            .partial_cmp(&signal[peaks[a]])
            .unwrap_or(Ordering::Equal)
            .then_with(|| peaks[a].cmp(&peaks[b]))
    });

    let mut keep = vec![true; peaks.len()];
    for &idx in &order {
        if !keep[idx] {
            continue;
        }
        let mut j = idx;
        while j > 0 && peaks[idx] - peaks[j - 1] < min_distance {
            j -= 1;
            keep[j] = false;
        }
        let mut j = idx;
        while j + 1 < peaks.len() && peaks[j + 1] - peaks[idx] < min_distance {
            j += 1;
            keep[j] = false;
        }
    }

    peaks
        .iter()
        .zip(&keep)
        .filter_map(|(&peak, &kept)| kept.then_some(peak))
        .collect()
}

/// Height of a peak above the higher of its two base minima, where each
/// base is the lowest sample between the peak and the nearest higher
/// sample (or the signal edge) on that side.
fn peak_prominence(signal: &[f64], peak: usize) -> f64 {
    let height = signal[peak];

    let mut left_min = height;
    let mut i = peak;
    while i > 0 {
        i -= 1;
        if signal[i] > height {
            break;
        }
        left_min = left_min.min(signal[i]);
    }

    let mut right_min = height;
    let mut i = peak;
    while i + 1 < signal.len() {
        i += 1;
        if signal[i] > height {
            break;
        }
        right_min = right_min.min(signal[i]);
    }

    height - left_min.max(right_min)
}
