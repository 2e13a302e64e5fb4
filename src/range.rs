//! Target range estimation from per-channel peak metrics.

use crate::config::DetectionConfig;
use crate::extrema::PeakMetrics;

/// Combines both channels' peak metrics into a single clamped range.
///
/// The formula multiplies each channel's peak frequency by its peak
/// magnitude, sums the products, and divides by a fixed scale. It has no
/// physical derivation and conflates units, but it is what the deployed
/// system shows, so the arithmetic is preserved as-is. Do not "fix" it
/// without confirming intent with the domain owners.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEstimator {
    scale: f64,
    max_range_m: f64,
}

impl DistanceEstimator {
    pub fn new(scale: f64, max_range_m: f64) -> Self {
        Self { scale, max_range_m }
    }

    pub fn from_config(cfg: &DetectionConfig) -> Self {
        Self::new(cfg.distance_scale, cfg.max_range_m)
    }

    /// Estimate the target distance in meters.
    ///
    /// Returns `None` when the combined metric is at or below 1.0 (treated
    /// as "no target"); otherwise the result is clamped to
    /// `[0, max_range_m]`.
    pub fn estimate(&self, ch1: &PeakMetrics, ch2: &PeakMetrics) -> Option<f64> {
        let combined = ch1.freq_khz * ch1.mag_db + ch2.freq_khz * ch2.mag_db;
        let distance = combined / self.scale;

        if distance > 1.0 {
            Some(distance.min(self.max_range_m).max(0.0))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> DistanceEstimator {
        DistanceEstimator::new(1000.0, 15.0)
    }

    fn metrics(freq_khz: f64, mag_db: f64) -> PeakMetrics {
        PeakMetrics { freq_khz, mag_db }
    }

    #[test]
    fn test_zero_metrics_no_target() {
        let zero = metrics(0.0, 0.0);
        assert_eq!(estimator().estimate(&zero, &zero), None);
    }

    #[test]
    fn test_below_threshold_no_target() {
        // Combined metric 900/1000 = 0.9 <= 1.0
        let m = metrics(9.0, 50.0);
        assert_eq!(estimator().estimate(&m, &metrics(0.0, 0.0)), None);
    }

    #[test]
    fn test_in_range_estimate() {
        let ch1 = metrics(100.0, 40.0);
        let ch2 = metrics(120.0, 30.0);
        // (4000 + 3600) / 1000 = 7.6
        let d = estimator().estimate(&ch1, &ch2).unwrap();
        assert!((d - 7.6).abs() < 1e-9);
    }

    #[test]
    fn test_clamped_to_max_range_exactly() {
        let hot = metrics(10_000.0, 100.0);
        let d = estimator().estimate(&hot, &hot).unwrap();
        assert_eq!(d, 15.0);
    }
}
