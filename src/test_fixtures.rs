//! Synthetic capture fixtures for development and testing
//!
//! This module generates deterministic two-channel capture frames with known
//! spectral content, allowing testing without committing binary capture
//! files to the repository.

use std::f64::consts::PI;

/// ADC mid-scale; a constant signal at this code is pure DC offset.
pub const MID_SCALE: u16 = 32_768;

/// Interleave two raw sample streams into capture-file byte layout
/// (alternating little-endian u16 words, channel 1 first).
///
/// The channels may differ in length; interleaving stops at the shorter one.
pub fn interleave_channels(ch1: &[u16], ch2: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ch1.len().min(ch2.len()) * 4);
    for (&a, &b) in ch1.iter().zip(ch2.iter()) {
        bytes.extend_from_slice(&a.to_le_bytes());
        bytes.extend_from_slice(&b.to_le_bytes());
    }
    bytes
}

/// Generate a pure sine wave at the given frequency.
///
/// # Example
/// ```
/// use radar_scope::test_fixtures::sine_samples;
/// // 100 kHz tone sampled at 1 MHz
/// let tone = sine_samples(100_000.0, 1_000_000.0, 1024, 1000.0);
/// assert_eq!(tone.len(), 1024);
/// ```
pub fn sine_samples(freq_hz: f64, sample_rate: f64, n: usize, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            amplitude * (2.0 * PI * freq_hz * t).sin()
        })
        .collect()
}

/// Build a capture frame carrying the same tone on both channels.
pub fn sine_capture(freq_hz: f64, sample_rate_hz: f64, n_per_channel: usize) -> Vec<u8> {
    let tone = sine_samples(freq_hz, sample_rate_hz, n_per_channel, 8000.0);
    let codes: Vec<u16> = tone
        .iter()
        .map(|&s| (s + f64::from(MID_SCALE)) as u16)
        .collect();
    interleave_channels(&codes, &codes)
}

/// Build a capture frame of constant mid-scale codes on both channels.
///
/// DC removal turns this into all-zero samples, so every spectrum bin sits
/// at the noise floor.
pub fn silent_capture(n_per_channel: usize) -> Vec<u8> {
    let codes = vec![MID_SCALE; n_per_channel];
    interleave_channels(&codes, &codes)
}
