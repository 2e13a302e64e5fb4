//! Typed queue payloads exchanged between workers and the consumer loop.
//!
//! These replace ad-hoc status dictionaries with explicit enums: "file not
//! ready" and "still computing" are ordinary values, never errors crossing
//! the queue boundary.

use crate::config::DetectionConfig;
use crate::decoder::{time_axis_us, ChannelPair};
use crate::extrema::{
    find_extrema, find_filtered_extrema, find_target, peak_metrics, Extremum, PeakMetrics,
    TargetScan,
};
use crate::spectrum::{Spectrum, SpectrumAnalyzer};
use serde::Serialize;

/// Messages on the PPI (plan position indicator) queue.
#[derive(Debug, Clone, PartialEq)]
pub enum PpiMessage {
    /// Calibrated sweep angle update from the angle worker
    Sweep { angle_deg: f64 },
    /// Target detection from the spectrum worker; the consumer pairs it
    /// with the last known sweep angle
    Target { distance_m: f64 },
}

/// Messages on the spectrum queue.
#[derive(Debug, Clone)]
pub enum SpectrumMessage {
    /// Capture file absent; nothing to process yet
    Waiting,
    /// Capture file changed; analysis in progress
    Processing,
    /// Completed analysis of one capture frame
    Done(Box<SpectrumFrame>),
}

/// Per-channel detection results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelMetrics {
    /// Global spectrum peak
    pub peak: PeakMetrics,
    /// Top peaks, strongest first
    pub peaks: Vec<Extremum>,
    /// Top valleys, deepest first
    pub valleys: Vec<Extremum>,
    /// Band-limited target candidates above the frequency threshold
    pub target: TargetScan,
    /// Extrema restricted to high bin indices
    pub filtered_peaks: Vec<Extremum>,
    pub filtered_valleys: Vec<Extremum>,
}

/// One channel's spectrum plus its detection results.
#[derive(Debug, Clone, Default)]
pub struct ChannelSpectrum {
    pub spectrum: Spectrum,
    pub metrics: ChannelMetrics,
}

/// Full analysis of one capture frame, both channels.
#[derive(Debug, Clone, Default)]
pub struct SpectrumFrame {
    pub ch1: ChannelSpectrum,
    pub ch2: ChannelSpectrum,
    /// Samples per channel
    pub n_samples: usize,
    pub sample_rate_hz: f64,
}

/// Raw time-domain view of one capture frame for the waveform display.
#[derive(Debug, Clone, Default)]
pub struct WaveformFrame {
    /// Time axis in microseconds
    pub time_axis_us: Vec<f64>,
    pub ch1: Vec<f64>,
    pub ch2: Vec<f64>,
}

fn analyze_channel(
    samples: &[f64],
    analyzer: &mut SpectrumAnalyzer,
    det: &DetectionConfig,
) -> ChannelSpectrum {
    let spectrum = analyzer.analyze(samples);

    let peak = peak_metrics(&spectrum);
    let (peaks, valleys) =
        find_extrema(&spectrum, det.n_extrema, det.prominence_db, det.min_distance_bins);
    let target = find_target(
        &spectrum,
        det.target_freq_threshold_khz,
        det.n_extrema,
        det.prominence_db,
        det.min_distance_bins,
    );
    let (filtered_peaks, filtered_valleys) = find_filtered_extrema(
        &spectrum,
        det.filtered_index_threshold,
        det.n_extrema,
        det.prominence_db,
        det.min_distance_bins,
    );

    ChannelSpectrum {
        spectrum,
        metrics: ChannelMetrics {
            peak,
            peaks,
            valleys,
            target,
            filtered_peaks,
            filtered_valleys,
        },
    }
}

impl SpectrumFrame {
    /// Run the full analysis chain on a decoded channel pair.
    pub fn from_channels(
        pair: &ChannelPair,
        analyzer: &mut SpectrumAnalyzer,
        det: &DetectionConfig,
        sample_rate_hz: f64,
    ) -> Self {
        Self {
            ch1: analyze_channel(&pair.ch1, analyzer, det),
            ch2: analyze_channel(&pair.ch2, analyzer, det),
            n_samples: pair.len(),
            sample_rate_hz,
        }
    }
}

impl WaveformFrame {
    pub fn from_channels(pair: ChannelPair, sample_rate_hz: f64) -> Self {
        Self {
            time_axis_us: time_axis_us(pair.len(), sample_rate_hz),
            ch1: pair.ch1,
            ch2: pair.ch2,
        }
    }
}
