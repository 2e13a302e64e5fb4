//! Capture file decoding.
//!
//! The acquisition process periodically rewrites a binary file of
//! little-endian `u16` samples, channel-interleaved `[CH1, CH2, CH1, CH2,
//! ...]`. The file may be briefly empty or truncated mid-write, so the
//! decoder truncates to an even byte count and an even sample count before
//! splitting channels.

use crate::error::DecodeError;
use std::path::Path;

/// Two de-interleaved, DC-removed channel sample buffers of equal length.
#[derive(Debug, Clone, Default)]
pub struct ChannelPair {
    pub ch1: Vec<f64>,
    pub ch2: Vec<f64>,
}

impl ChannelPair {
    /// Samples per channel
    pub fn len(&self) -> usize {
        self.ch1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ch1.is_empty()
    }
}

/// Result of attempting to read the capture file.
///
/// A missing or unreadable file is a normal transient condition (the
/// acquisition process may not have started yet), not an error.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// File missing or unreadable; skip this cycle
    Missing,
    /// Decoded frame (possibly empty if the file was empty)
    Frame(ChannelPair),
}

/// Decode a raw byte buffer into two DC-removed channels.
///
/// A trailing unpaired byte is dropped, and a trailing unpaired sample is
/// dropped, so both channels always come out the same length.
pub fn decode_frame(bytes: &[u8]) -> ChannelPair {
    // Even byte length for u16 parsing
    let bytes = &bytes[..bytes.len() & !1];

    let mut values: Vec<f64> = bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]) as f64)
        .collect();

    // Even sample count for two-channel deinterleaving
    if values.len() % 2 != 0 {
        values.pop();
    }

    let mut ch1: Vec<f64> = values.iter().step_by(2).copied().collect();
    let mut ch2: Vec<f64> = values.iter().skip(1).step_by(2).copied().collect();

    remove_dc(&mut ch1);
    remove_dc(&mut ch2);

    ChannelPair { ch1, ch2 }
}

fn remove_dc(samples: &mut [f64]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    for s in samples.iter_mut() {
        *s -= mean;
    }
}

/// Read and decode the capture file, surfacing read failures.
pub fn try_read_capture(path: &Path) -> Result<ChannelPair, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_frame(&bytes))
}

/// Read and decode the capture file.
///
/// Returns [`DecodeOutcome::Missing`] when the file does not exist or cannot
/// be read; the caller treats that as "no new data this cycle".
pub fn read_capture(path: &Path) -> DecodeOutcome {
    match try_read_capture(path) {
        Ok(pair) => DecodeOutcome::Frame(pair),
        Err(e) => {
            let not_found = matches!(
                &e,
                DecodeError::ReadFailed { source, .. }
                    if source.kind() == std::io::ErrorKind::NotFound
            );
            if !not_found {
                tracing::warn!(error = %e, "capture file unreadable");
            }
            DecodeOutcome::Missing
        }
    }
}

/// Time axis in microseconds for `n` samples at the given rate.
pub fn time_axis_us(n: usize, sample_rate_hz: f64) -> Vec<f64> {
    if n == 0 || sample_rate_hz <= 0.0 {
        return Vec::new();
    }
    let dt_us = 1e6 / sample_rate_hz;
    (0..n).map(|i| i as f64 * dt_us).collect()
}

/// Basic statistics for a channel buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub rms: f64,
}

/// Compute basic statistics; all zeros for an empty buffer.
pub fn basic_stats(samples: &[f64]) -> SignalStats {
    if samples.is_empty() {
        return SignalStats::default();
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let sq_mean = samples.iter().map(|s| s * s).sum::<f64>() / n;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &s in samples {
        min = min.min(s);
        max = max.max(s);
    }

    SignalStats {
        mean,
        std: var.sqrt(),
        min,
        max,
        rms: sq_mean.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::interleave_channels;
    use proptest::prelude::*;

    #[test]
    fn test_decode_deinterleaves_channels() {
        let bytes = interleave_channels(&[100, 200, 300], &[1000, 2000, 3000]);
        let pair = decode_frame(&bytes);

        assert_eq!(pair.len(), 3);
        // DC removed: mean of [100, 200, 300] is 200
        assert!((pair.ch1[0] - (-100.0)).abs() < 1e-9);
        assert!((pair.ch1[2] - 100.0).abs() < 1e-9);
        assert!((pair.ch2[1] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_zero_mean() {
        let bytes = interleave_channels(&[5, 17, 900, 42], &[7, 7, 7, 7]);
        let pair = decode_frame(&bytes);

        let mean1: f64 = pair.ch1.iter().sum::<f64>() / pair.ch1.len() as f64;
        let mean2: f64 = pair.ch2.iter().sum::<f64>() / pair.ch2.len() as f64;
        assert!(mean1.abs() < 1e-9);
        assert!(mean2.abs() < 1e-9);
    }

    #[test]
    fn test_decode_truncates_odd_byte() {
        // 5 bytes: two u16 samples plus one dangling byte
        let pair = decode_frame(&[0x01, 0x00, 0x02, 0x00, 0xff]);
        assert_eq!(pair.len(), 1);
    }

    #[test]
    fn test_decode_truncates_odd_sample_count() {
        // 3 u16 samples: trailing unpaired sample is dropped
        let pair = decode_frame(&[1, 0, 2, 0, 3, 0]);
        assert_eq!(pair.ch1.len(), 1);
        assert_eq!(pair.ch2.len(), 1);
    }

    #[test]
    fn test_decode_empty_buffer() {
        let pair = decode_frame(&[]);
        assert!(pair.is_empty());
    }

    #[test]
    fn test_read_capture_missing_file() {
        let outcome = read_capture(Path::new("/nonexistent/capture.bin"));
        assert!(matches!(outcome, DecodeOutcome::Missing));
    }

    #[test]
    fn test_try_read_capture_missing_file_errors() {
        let err = try_read_capture(Path::new("/nonexistent/capture.bin")).unwrap_err();
        assert!(matches!(err, DecodeError::ReadFailed { .. }));
        assert!(err.to_string().contains("capture.bin"));
    }

    #[test]
    fn test_time_axis_spacing() {
        let axis = time_axis_us(4, 1_000_000.0);
        assert_eq!(axis.len(), 4);
        assert!((axis[1] - 1.0).abs() < 1e-12);
        assert!((axis[3] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_axis_degenerate() {
        assert!(time_axis_us(0, 1000.0).is_empty());
        assert!(time_axis_us(10, 0.0).is_empty());
    }

    #[test]
    fn test_basic_stats() {
        let stats = basic_stats(&[1.0, -1.0, 1.0, -1.0]);
        assert!((stats.mean - 0.0).abs() < 1e-12);
        assert!((stats.std - 1.0).abs() < 1e-12);
        assert!((stats.rms - 1.0).abs() < 1e-12);
        assert_eq!(stats.min, -1.0);
        assert_eq!(stats.max, 1.0);
    }

    #[test]
    fn test_basic_stats_empty() {
        assert_eq!(basic_stats(&[]), SignalStats::default());
    }

    proptest! {
        #[test]
        fn decode_never_panics_and_channels_match(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let pair = decode_frame(&bytes);
            prop_assert_eq!(pair.ch1.len(), pair.ch2.len());
            prop_assert!(pair.len() <= bytes.len() / 4 + 1);
        }

        #[test]
        fn decoded_channels_are_zero_mean(bytes in proptest::collection::vec(any::<u8>(), 8..512)) {
            let pair = decode_frame(&bytes);
            if !pair.is_empty() {
                let mean1: f64 = pair.ch1.iter().sum::<f64>() / pair.ch1.len() as f64;
                prop_assert!(mean1.abs() < 1e-6);
            }
        }
    }
}
