//! Pipeline metrics collection and reporting.
//!
//! Uses an HDR histogram for accurate analysis-latency percentiles; the
//! struct is shared across worker threads behind an `Arc`.

use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Shared metrics for the acquisition pipeline.
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Full decode+analyze latency per capture frame (microseconds)
    analysis_latency_us: Mutex<Histogram<u64>>,

    /// Capture frames fully analyzed
    frames_processed: AtomicU64,

    /// Poll cycles that found the capture file missing
    decode_misses: AtomicU64,

    /// Serial lines parsed successfully
    serial_lines_ok: AtomicU64,

    /// Serial lines dropped as malformed
    serial_lines_bad: AtomicU64,

    /// Targets produced by the distance estimator
    targets_detected: AtomicU64,

    started: Instant,
}

/// Snapshot of key metrics for display or logging.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub analysis_p50_us: f64,
    pub analysis_p99_us: f64,
    pub frames_processed: u64,
    pub decode_misses: u64,
    pub serial_lines_ok: u64,
    pub serial_lines_bad: u64,
    pub targets_detected: u64,
    pub uptime_secs: f64,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        // 1 µs to 10 s, 2 significant digits
        let hist = Histogram::new_with_bounds(1, 10_000_000, 2)
            .expect("Histogram creation should succeed");

        Self {
            analysis_latency_us: Mutex::new(hist),
            frames_processed: AtomicU64::new(0),
            decode_misses: AtomicU64::new(0),
            serial_lines_ok: AtomicU64::new(0),
            serial_lines_bad: AtomicU64::new(0),
            targets_detected: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Record one completed decode+analyze pass
    pub fn record_analysis(&self, duration: Duration) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);

        let us = duration.as_micros().max(1) as u64;
        if let Ok(mut hist) = self.analysis_latency_us.lock() {
            if let Err(e) = hist.record(us) {
                tracing::warn!("Failed to record analysis latency: {}", e);
            }
        }
    }

    /// Record a poll cycle with the capture file absent
    pub fn record_decode_miss(&self) {
        self.decode_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one serial line, parsed or dropped
    pub fn record_serial_line(&self, ok: bool) {
        if ok {
            self.serial_lines_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.serial_lines_bad.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a target emitted by the distance estimator
    pub fn record_target(&self) {
        self.targets_detected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let (p50, p99) = match self.analysis_latency_us.lock() {
            Ok(hist) => (
                hist.value_at_quantile(0.5) as f64,
                hist.value_at_quantile(0.99) as f64,
            ),
            Err(_) => (0.0, 0.0),
        };

        MetricsSummary {
            analysis_p50_us: p50,
            analysis_p99_us: p99,
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            decode_misses: self.decode_misses.load(Ordering::Relaxed),
            serial_lines_ok: self.serial_lines_ok.load(Ordering::Relaxed),
            serial_lines_bad: self.serial_lines_bad.load(Ordering::Relaxed),
            targets_detected: self.targets_detected.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_analysis(Duration::from_micros(150));
        metrics.record_analysis(Duration::from_micros(300));

        let summary = metrics.summary();
        assert_eq!(summary.frames_processed, 2);
        assert!(summary.analysis_p99_us >= summary.analysis_p50_us);
    }

    #[test]
    fn test_serial_line_counters() {
        let metrics = PipelineMetrics::new();

        metrics.record_serial_line(true);
        metrics.record_serial_line(true);
        metrics.record_serial_line(false);

        let summary = metrics.summary();
        assert_eq!(summary.serial_lines_ok, 2);
        assert_eq!(summary.serial_lines_bad, 1);
    }

    #[test]
    fn test_target_and_miss_counters() {
        let metrics = PipelineMetrics::new();

        metrics.record_target();
        metrics.record_decode_miss();
        metrics.record_decode_miss();

        let summary = metrics.summary();
        assert_eq!(summary.targets_detected, 1);
        assert_eq!(summary.decode_misses, 2);
    }
}
