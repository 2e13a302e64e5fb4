//! Peak, valley, and target detection on a dB magnitude spectrum.
//!
//! Peak acceptance follows the usual prominence rule: a local maximum
//! qualifies only if the signal drops by at least the prominence threshold
//! on both sides before reaching a higher point, which rejects noise-level
//! wiggles. Valleys are found by negating the magnitude series and running
//! the same search.

use crate::spectrum::Spectrum;
use serde::Serialize;

/// One detected spectral extremum, bound to the spectrum it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    /// Bin index in the full (untruncated) spectrum
    pub index: usize,
    /// Bin frequency in kHz
    pub freq_khz: f64,
    /// Bin magnitude in dB
    pub mag_db: f64,
}

/// Global peak frequency/magnitude of one channel's spectrum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeakMetrics {
    pub freq_khz: f64,
    pub mag_db: f64,
}

/// Result of the band-limited target search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetScan {
    /// Candidate peaks above the frequency threshold, strongest first
    pub peaks: Vec<Extremum>,
    /// Frequency of the strongest candidate in kHz (0 when none)
    pub freq_khz: f64,
    /// Magnitude of the strongest candidate in dB (0 when none)
    pub mag_db: f64,
}

/// Global argmax of the magnitude series; zeros for an empty spectrum.
pub fn peak_metrics(spectrum: &Spectrum) -> PeakMetrics {
    let mut best: Option<usize> = None;
    for (i, &m) in spectrum.magnitude_db.iter().enumerate() {
        if best.map_or(true, |b| m > spectrum.magnitude_db[b]) {
            best = Some(i);
        }
    }

    match best {
        Some(i) => PeakMetrics {
            freq_khz: spectrum.frequencies_khz[i],
            mag_db: spectrum.magnitude_db[i],
        },
        None => PeakMetrics::default(),
    }
}

/// Indices of local maxima; flat plateaus report their midpoint.
fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut maxima = Vec::new();

    let mut i = 1;
    while n >= 3 && i < n - 1 {
        if values[i] > values[i - 1] {
            // Walk across a possible plateau
            let mut j = i;
            while j + 1 < n && values[j + 1] == values[i] {
                j += 1;
            }
            if j + 1 < n && values[j + 1] < values[i] {
                maxima.push((i + j) / 2);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }

    maxima
}

/// Prominence of each candidate peak: height above the higher of the two
/// surrounding bases (the minima between the peak and the nearest
/// higher-or-equal point, or the signal edge).
fn peak_prominences(values: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&p| {
            let height = values[p];

            let mut left_min = height;
            let mut i = p;
            while i > 0 {
                i -= 1;
                if values[i] > height {
                    break;
                }
                left_min = left_min.min(values[i]);
            }

            let mut right_min = height;
            let mut i = p;
            while i + 1 < values.len() {
                i += 1;
                if values[i] > height {
                    break;
                }
                right_min = right_min.min(values[i]);
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Drop peaks closer than `distance` bins to a taller accepted peak.
fn enforce_distance(values: &[f64], peaks: Vec<usize>, distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    // Visit by descending height; taller peaks claim their neighborhood
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        values[peaks[b]]
            .partial_cmp(&values[peaks[a]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = vec![true; peaks.len()];
    for &rank in &order {
        if !keep[rank] {
            continue;
        }
        for other in 0..peaks.len() {
            if other != rank && keep[other] && peaks[other].abs_diff(peaks[rank]) < distance {
                // Tie goes to the earlier-visited (taller) peak
                if values[peaks[other]] <= values[peaks[rank]] {
                    keep[other] = false;
                }
            }
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

/// Local maxima with minimum spacing and prominence constraints.
pub fn find_peaks(values: &[f64], prominence: f64, distance: usize) -> Vec<usize> {
    let candidates = local_maxima(values);
    let candidates = enforce_distance(values, candidates, distance);
    let prominences = peak_prominences(values, &candidates);

    candidates
        .into_iter()
        .zip(prominences)
        .filter_map(|(p, prom)| (prom >= prominence).then_some(p))
        .collect()
}

fn to_extrema(spectrum: &Spectrum, indices: &[usize], index_offset: usize) -> Vec<Extremum> {
    indices
        .iter()
        .map(|&i| Extremum {
            index: i + index_offset,
            freq_khz: spectrum.frequencies_khz[i + index_offset],
            mag_db: spectrum.magnitude_db[i + index_offset],
        })
        .collect()
}

fn extrema_in_band(
    spectrum: &Spectrum,
    band: &[f64],
    band_offset: usize,
    n: usize,
    prominence_db: f64,
    min_distance_bins: usize,
) -> (Vec<Extremum>, Vec<Extremum>) {
    let mut peak_idx = find_peaks(band, prominence_db, min_distance_bins);
    peak_idx.sort_by(|&a, &b| {
        band[b]
            .partial_cmp(&band[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    peak_idx.truncate(n);

    let negated: Vec<f64> = band.iter().map(|m| -m).collect();
    let mut valley_idx = find_peaks(&negated, prominence_db, min_distance_bins);
    valley_idx.sort_by(|&a, &b| {
        band[a]
            .partial_cmp(&band[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    valley_idx.truncate(n);

    (
        to_extrema(spectrum, &peak_idx, band_offset),
        to_extrema(spectrum, &valley_idx, band_offset),
    )
}

/// Top-`n` peaks and valleys of the whole spectrum.
///
/// Peaks come back strongest-magnitude first; valleys lowest-magnitude
/// first. Empty spectrum yields empty lists.
pub fn find_extrema(
    spectrum: &Spectrum,
    n: usize,
    prominence_db: f64,
    min_distance_bins: usize,
) -> (Vec<Extremum>, Vec<Extremum>) {
    if spectrum.is_empty() {
        return (Vec::new(), Vec::new());
    }
    extrema_in_band(
        spectrum,
        &spectrum.magnitude_db,
        0,
        n,
        prominence_db,
        min_distance_bins,
    )
}

/// Band-limited target search: peaks at or above `freq_threshold_khz`.
///
/// When the band contains samples but no peak satisfies the prominence and
/// distance constraints, the single in-band global maximum is returned so a
/// target candidate always exists for a non-empty band.
pub fn find_target(
    spectrum: &Spectrum,
    freq_threshold_khz: f64,
    n: usize,
    prominence_db: f64,
    min_distance_bins: usize,
) -> TargetScan {
    if spectrum.is_empty() {
        return TargetScan::default();
    }

    let start = spectrum
        .frequencies_khz
        .iter()
        .position(|&f| f >= freq_threshold_khz);

    let Some(start) = start else {
        // No bins above the threshold
        return TargetScan::default();
    };

    let band = &spectrum.magnitude_db[start..];

    let mut peak_idx = find_peaks(band, prominence_db, min_distance_bins);

    if peak_idx.is_empty() {
        // Fall back to the in-band global maximum
        let mut max_i = 0;
        for (i, &m) in band.iter().enumerate() {
            if m > band[max_i] {
                max_i = i;
            }
        }
        let peaks = to_extrema(spectrum, &[max_i], start);
        return TargetScan {
            freq_khz: peaks[0].freq_khz,
            mag_db: peaks[0].mag_db,
            peaks,
        };
    }

    peak_idx.sort_by(|&a, &b| {
        band[b]
            .partial_cmp(&band[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    peak_idx.truncate(n);

    let peaks = to_extrema(spectrum, &peak_idx, start);
    TargetScan {
        freq_khz: peaks[0].freq_khz,
        mag_db: peaks[0].mag_db,
        peaks,
    }
}

/// Like [`find_extrema`] but restricted to bin indices at or above
/// `index_threshold`; reported indices stay in the full spectrum's
/// coordinate space.
pub fn find_filtered_extrema(
    spectrum: &Spectrum,
    index_threshold: usize,
    n: usize,
    prominence_db: f64,
    min_distance_bins: usize,
) -> (Vec<Extremum>, Vec<Extremum>) {
    if spectrum.is_empty() || index_threshold >= spectrum.len() {
        return (Vec::new(), Vec::new());
    }

    extrema_in_band(
        spectrum,
        &spectrum.magnitude_db[index_threshold..],
        index_threshold,
        n,
        prominence_db,
        min_distance_bins,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum_from(mags: Vec<f64>) -> Spectrum {
        let frequencies_khz = (0..mags.len()).map(|i| i as f64).collect();
        Spectrum {
            frequencies_khz,
            magnitude_db: mags,
        }
    }

    #[test]
    fn test_peak_metrics_argmax() {
        let s = spectrum_from(vec![0.0, 5.0, 20.0, 3.0]);
        let m = peak_metrics(&s);
        assert_eq!(m.freq_khz, 2.0);
        assert_eq!(m.mag_db, 20.0);
    }

    #[test]
    fn test_peak_metrics_empty() {
        let m = peak_metrics(&Spectrum::default());
        assert_eq!(m, PeakMetrics::default());
    }

    #[test]
    fn test_find_peaks_prominence_rejects_wiggles() {
        // Two bumps: one 10 dB, one 1 dB above the surroundings
        let values = vec![0.0, 10.0, 0.0, 1.0, 0.0];
        let peaks = find_peaks(&values, 3.0, 1);
        assert_eq!(peaks, vec![1]);
    }

    #[test]
    fn test_find_peaks_plateau_midpoint() {
        let values = vec![0.0, 5.0, 5.0, 5.0, 0.0];
        let peaks = find_peaks(&values, 1.0, 1);
        assert_eq!(peaks, vec![2]);
    }

    #[test]
    fn test_find_peaks_min_distance_keeps_taller() {
        let values = vec![0.0, 8.0, 0.5, 9.0, 0.0, 0.0, 0.0, 7.0, 0.0];
        let peaks = find_peaks(&values, 1.0, 4);
        // 8.0 at index 1 is within 4 bins of the taller 9.0 at index 3
        assert_eq!(peaks, vec![3, 7]);
    }

    #[test]
    fn test_find_extrema_sorted_and_truncated() {
        let values = vec![0.0, 6.0, 0.0, 9.0, 0.0, 4.0, 0.0, 8.0, 0.0];
        let s = spectrum_from(values);
        let (peaks, valleys) = find_extrema(&s, 2, 3.0, 1);

        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].mag_db, 9.0);
        assert_eq!(peaks[1].mag_db, 8.0);

        // Interior zeros between peaks are valleys
        assert!(!valleys.is_empty());
        assert!(valleys[0].mag_db <= valleys.last().unwrap().mag_db);
    }

    #[test]
    fn test_find_extrema_flat_spectrum() {
        let s = spectrum_from(vec![-20.0; 64]);
        let (peaks, valleys) = find_extrema(&s, 5, 3.0, 1);
        assert!(peaks.is_empty());
        assert!(valleys.is_empty());
    }

    #[test]
    fn test_find_target_no_band() {
        let s = spectrum_from(vec![0.0, 1.0, 2.0]);
        // Frequencies are 0,1,2 kHz; threshold far above
        let scan = find_target(&s, 100.0, 3, 3.0, 1);
        assert!(scan.peaks.is_empty());
        assert_eq!(scan.freq_khz, 0.0);
        assert_eq!(scan.mag_db, 0.0);
    }

    #[test]
    fn test_find_target_fallback_to_max() {
        // Monotone band: no local maximum, falls back to the global max
        let s = spectrum_from(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let scan = find_target(&s, 2.0, 3, 3.0, 1);
        assert_eq!(scan.peaks.len(), 1);
        assert_eq!(scan.peaks[0].index, 5);
        assert_eq!(scan.freq_khz, 5.0);
        assert_eq!(scan.mag_db, 5.0);
    }

    #[test]
    fn test_find_target_picks_in_band_peak() {
        let mut mags = vec![0.0; 32];
        mags[4] = 50.0; // below threshold, must be ignored
        mags[20] = 30.0;
        let s = spectrum_from(mags);

        let scan = find_target(&s, 10.0, 3, 3.0, 1);
        assert_eq!(scan.peaks[0].index, 20);
        assert_eq!(scan.freq_khz, 20.0);
        assert_eq!(scan.mag_db, 30.0);
    }

    #[test]
    fn test_filtered_extrema_index_translation() {
        let mut mags = vec![0.0; 32];
        mags[5] = 40.0;
        mags[25] = 10.0;
        let s = spectrum_from(mags);

        let (peaks, _) = find_filtered_extrema(&s, 10, 5, 3.0, 1);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 25);
        assert_eq!(peaks[0].freq_khz, 25.0);
    }

    #[test]
    fn test_filtered_extrema_threshold_past_end() {
        let s = spectrum_from(vec![0.0, 10.0, 0.0]);
        let (peaks, valleys) = find_filtered_extrema(&s, 100, 5, 3.0, 1);
        assert!(peaks.is_empty());
        assert!(valleys.is_empty());
    }
}
