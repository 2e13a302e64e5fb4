//! Sweep angle synchronization.
//!
//! The rotator firmware reports a raw encoder angle that may start at an
//! arbitrary offset and reverses direction at the sweep limit switches.
//! [`AngleSynchronizer`] converts that feed into a calibrated 0-180°
//! display angle: the baseline is captured on the first sample and
//! re-captured at every direction reversal, then increasing raw sweeps map
//! to 0→180 and decreasing sweeps map to 180→0.

/// Direction of the raw angle sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirection {
    Increasing,
    Decreasing,
}

/// State machine translating raw encoder angles into display angles.
///
/// State is private to the owning worker; reconnecting the serial feed
/// must call [`reset`](Self::reset) so a stale baseline from the previous
/// connection cannot skew the first sweep.
#[derive(Debug)]
pub struct AngleSynchronizer {
    prev_raw: Option<f64>,
    direction: Option<SweepDirection>,
    base_offset: f64,
    /// Raw deltas below this are treated as encoder noise, in degrees
    eps: f64,
}

impl AngleSynchronizer {
    pub fn new(eps: f64) -> Self {
        Self {
            prev_raw: None,
            direction: None,
            base_offset: 0.0,
            eps,
        }
    }

    /// Return to the unsynced state. Called on serial reconnect.
    pub fn reset(&mut self) {
        self.prev_raw = None;
        self.direction = None;
        self.base_offset = 0.0;
    }

    /// Feed one raw angle sample; returns the display angle to emit, if any.
    ///
    /// - First sample establishes the baseline and emits 0°.
    /// - Deltas below `eps` are noise: state advances, nothing is emitted.
    /// - A direction reversal (limit switch) re-captures the baseline, so
    ///   the first reversed sample maps to the far end of the sweep.
    pub fn feed(&mut self, raw: f64) -> Option<f64> {
        let Some(prev) = self.prev_raw else {
            self.base_offset = raw;
            self.prev_raw = Some(raw);
            self.direction = None;
            return Some(0.0);
        };

        let delta = raw - prev;
        if delta.abs() < self.eps {
            self.prev_raw = Some(raw);
            return None;
        }

        let dir = if delta > 0.0 {
            SweepDirection::Increasing
        } else {
            SweepDirection::Decreasing
        };

        match self.direction {
            None => {
                // First movement: keep the baseline captured on the first
                // sample so the sweep starts counting from it
                self.direction = Some(dir);
            }
            Some(prev_dir) if prev_dir != dir => {
                // Limit switch hit: re-baseline at the turnaround point
                self.direction = Some(dir);
                self.base_offset = raw;
            }
            Some(_) => {}
        }

        let ui_angle = match dir {
            SweepDirection::Increasing => raw - self.base_offset,
            SweepDirection::Decreasing => 180.0 - (self.base_offset - raw),
        };

        self.prev_raw = Some(raw);
        Some(ui_angle.clamp(0.0, 180.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(sync: &mut AngleSynchronizer, raw: &[f64]) -> Vec<f64> {
        raw.iter().filter_map(|&a| sync.feed(a)).collect()
    }

    #[test]
    fn test_monotone_up_sweep_maps_identically() {
        let mut sync = AngleSynchronizer::new(1e-3);
        let raw: Vec<f64> = (0..18).map(|i| (i * 10) as f64).collect();
        let ui = feed_all(&mut sync, &raw);

        assert_eq!(ui, raw);
    }

    #[test]
    fn test_offset_baseline_removed() {
        let mut sync = AngleSynchronizer::new(1e-3);
        let ui = feed_all(&mut sync, &[400.0, 410.0, 420.0]);
        assert_eq!(ui, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_reversal_rebaselines_to_180() {
        let mut sync = AngleSynchronizer::new(1e-3);
        let mut raw: Vec<f64> = (0..18).map(|i| (i * 10) as f64).collect();
        raw.extend([160.0, 150.0, 140.0]);

        let ui = feed_all(&mut sync, &raw);

        // First reversal sample maps to 180, then counts down
        assert_eq!(ui[18], 180.0);
        assert_eq!(ui[19], 170.0);
        assert_eq!(ui[20], 160.0);
    }

    #[test]
    fn test_second_reversal_back_to_zero() {
        let mut sync = AngleSynchronizer::new(1e-3);
        feed_all(&mut sync, &[0.0, 10.0, 20.0, 10.0]); // up, then down
        // Reversing upward again re-baselines at the bottom
        assert_eq!(sync.feed(20.0), Some(0.0));
        assert_eq!(sync.feed(30.0), Some(10.0));
    }

    #[test]
    fn test_noise_delta_suppressed() {
        let mut sync = AngleSynchronizer::new(1e-3);
        assert_eq!(sync.feed(10.0), Some(0.0));
        // Sub-epsilon jitter: no emission, but prev advances
        assert_eq!(sync.feed(10.0004), None);
        assert_eq!(sync.feed(10.0008), None);
        // Real movement resumes from the jittered position
        assert_eq!(sync.feed(20.0), Some(10.0));
    }

    #[test]
    fn test_clamped_to_sweep_range() {
        let mut sync = AngleSynchronizer::new(1e-3);
        feed_all(&mut sync, &[0.0, 100.0]);
        // Raw overshoots past 180 relative to the baseline
        assert_eq!(sync.feed(300.0), Some(180.0));
    }

    #[test]
    fn test_reset_returns_to_unsynced() {
        let mut sync = AngleSynchronizer::new(1e-3);
        feed_all(&mut sync, &[50.0, 60.0, 70.0]);

        sync.reset();
        // Behaves like a fresh connection
        assert_eq!(sync.feed(500.0), Some(0.0));
        assert_eq!(sync.feed(510.0), Some(10.0));
    }
}
