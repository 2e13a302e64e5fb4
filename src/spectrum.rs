//! Spectrum analysis: windowing, real FFT, dB conversion, smoothing, and
//! noise-floor clamping.
//!
//! The smoothing fallback ladder (window shrinking for short signals) is
//! load-bearing: changing it moves displayed peak positions, so it is kept
//! exactly as deployed.

use crate::config::SpectrumConfig;
use num_complex::Complex64;
use realfft::RealFftPlanner;

/// Small offset added before `log10` to avoid `log(0)` on silent bins.
const DB_EPSILON: f64 = 1e-12;

/// One-sided frequency spectrum.
///
/// `frequencies_khz` and `magnitude_db` are always the same length:
/// `floor(N/2) + 1` bins for an N-sample input.
#[derive(Debug, Clone, Default)]
pub struct Spectrum {
    /// Bin frequencies in kHz, ascending from 0
    pub frequencies_khz: Vec<f64>,
    /// Bin magnitudes in dB
    pub magnitude_db: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitude_db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude_db.is_empty()
    }
}

/// Window function applied before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Hann,
    Hamming,
    Blackman,
    /// No window
    Rectangular,
}

impl WindowKind {
    /// Parse a window name. Unknown names fall back to no window rather
    /// than failing.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "hann" | "hanning" => WindowKind::Hann,
            "hamming" => WindowKind::Hamming,
            "blackman" => WindowKind::Blackman,
            "none" | "rectangular" | "boxcar" | "" => WindowKind::Rectangular,
            other => {
                tracing::debug!(window = other, "unknown window name, using no window");
                WindowKind::Rectangular
            }
        }
    }

    /// Periodic (DFT-even) window coefficients, or `None` for rectangular.
    fn coefficients(self, n: usize) -> Option<Vec<f64>> {
        use std::f64::consts::PI;

        if n == 0 {
            return None;
        }
        let step = 2.0 * PI / n as f64;

        match self {
            WindowKind::Rectangular => None,
            WindowKind::Hann => {
                Some((0..n).map(|i| 0.5 - 0.5 * (step * i as f64).cos()).collect())
            }
            WindowKind::Hamming => Some(
                (0..n)
                    .map(|i| 0.54 - 0.46 * (step * i as f64).cos())
                    .collect(),
            ),
            WindowKind::Blackman => Some(
                (0..n)
                    .map(|i| {
                        let x = step * i as f64;
                        0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
                    })
                    .collect(),
            ),
        }
    }
}

/// Smoothing applied to the dB magnitude series.
#[derive(Debug, Clone, PartialEq)]
pub enum Smoothing {
    Off,
    /// Uniform-kernel convolution ("same" padding)
    MovingAverage { window: usize },
    /// Local least-squares polynomial fit
    SavitzkyGolay { window: usize, polyorder: usize },
}

impl Smoothing {
    pub fn from_config(cfg: &SpectrumConfig) -> Self {
        if !cfg.smoothing_enabled {
            return Smoothing::Off;
        }
        match cfg.smoothing_method.to_ascii_lowercase().as_str() {
            "savgol" => Smoothing::SavitzkyGolay {
                window: cfg.savgol_window,
                polyorder: cfg.savgol_polyorder,
            },
            _ => Smoothing::MovingAverage {
                window: cfg.smoothing_window,
            },
        }
    }
}

/// Spectrum analyzer holding the FFT planner and processing parameters.
///
/// The planner caches FFT plans per input length, so reusing one analyzer
/// across frames avoids replanning.
pub struct SpectrumAnalyzer {
    sample_rate_hz: f64,
    window: WindowKind,
    smoothing: Smoothing,
    floor_db: Option<f64>,
    planner: RealFftPlanner<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(
        sample_rate_hz: f64,
        window: WindowKind,
        smoothing: Smoothing,
        floor_db: Option<f64>,
    ) -> Self {
        Self {
            sample_rate_hz,
            window,
            smoothing,
            floor_db,
            planner: RealFftPlanner::new(),
        }
    }

    pub fn from_config(cfg: &SpectrumConfig, sample_rate_hz: f64) -> Self {
        Self::new(
            sample_rate_hz,
            WindowKind::parse(&cfg.window),
            Smoothing::from_config(cfg),
            cfg.floor_db,
        )
    }

    /// Compute the one-sided dB magnitude spectrum of a channel.
    ///
    /// Zero-length input yields an empty spectrum rather than an error.
    pub fn analyze(&mut self, samples: &[f64]) -> Spectrum {
        let n = samples.len();
        if n == 0 {
            return Spectrum::default();
        }

        let mut input = samples.to_vec();
        if let Some(coeffs) = self.window.coefficients(n) {
            for (s, w) in input.iter_mut().zip(coeffs.iter()) {
                *s *= w;
            }
        }

        let r2c = self.planner.plan_fft_forward(n);
        let mut output: Vec<Complex64> = r2c.make_output_vec();
        if r2c.process(&mut input, &mut output).is_err() {
            return Spectrum::default();
        }

        let mut magnitude_db: Vec<f64> = output
            .iter()
            .map(|c| 20.0 * (c.norm() + DB_EPSILON).log10())
            .collect();

        magnitude_db = smooth_spectrum(&magnitude_db, &self.smoothing);

        if let Some(floor) = self.floor_db {
            for m in magnitude_db.iter_mut() {
                if *m < floor {
                    *m = floor;
                }
            }
        }

        let bins = magnitude_db.len();
        let frequencies_khz = (0..bins)
            .map(|k| k as f64 * self.sample_rate_hz / n as f64 / 1000.0)
            .collect();

        Spectrum {
            frequencies_khz,
            magnitude_db,
        }
    }
}

/// Apply the configured smoothing to a magnitude series.
///
/// Incompatible window settings shrink to the largest valid odd window, or
/// skip smoothing entirely, mirroring the deployed behavior.
pub fn smooth_spectrum(magnitudes: &[f64], smoothing: &Smoothing) -> Vec<f64> {
    let n = magnitudes.len();
    if n == 0 {
        return Vec::new();
    }

    match *smoothing {
        Smoothing::Off => magnitudes.to_vec(),
        Smoothing::MovingAverage { window } => {
            if window <= 1 || n < window {
                return magnitudes.to_vec();
            }
            moving_average(magnitudes, window)
        }
        Smoothing::SavitzkyGolay { window, polyorder } => {
            if n < 3 {
                return magnitudes.to_vec();
            }

            let mut window = window.min(n);
            if window % 2 == 0 {
                window -= 1;
            }

            let mut min_window = (polyorder + 1).max(3);
            if min_window % 2 == 0 {
                min_window += 1;
            }

            if window < min_window {
                window = min_window;
            }
            if window > n {
                window = if n % 2 == 1 { n } else { n - 1 };
            }

            if window < 3 || window <= polyorder {
                return magnitudes.to_vec();
            }

            savgol_filter(magnitudes, window, polyorder)
        }
    }
}

/// Uniform-kernel convolution with "same" output length; edges are
/// zero-padded, matching a same-mode convolution against a ones kernel.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let offset = (window - 1) / 2;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let m = i + offset;
        let lo = m.saturating_sub(window - 1);
        let hi = m.min(n - 1);
        let sum: f64 = values[lo..=hi].iter().sum();
        out.push(sum / window as f64);
    }

    out
}

/// Savitzky-Golay smoothing with polynomial edge extrapolation.
///
/// Interior points use the precomputed center convolution coefficients;
/// the first and last half-windows are filled by evaluating a polynomial
/// fitted to the first/last `window` samples.
pub fn savgol_filter(values: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    debug_assert!(window % 2 == 1 && window > polyorder);

    let n = values.len();
    let half = window / 2;
    let mut out = vec![0.0; n];

    let coeffs = savgol_center_coefficients(window, polyorder);
    for i in half..n.saturating_sub(half) {
        let mut acc = 0.0;
        for (k, c) in coeffs.iter().enumerate() {
            acc += c * values[i - half + k];
        }
        out[i] = acc;
    }

    // Head: fit the first window and evaluate in place
    let xs: Vec<f64> = (0..window).map(|i| i as f64).collect();
    let head_fit = polyfit(&xs, &values[..window], polyorder);
    for (i, slot) in out.iter_mut().take(half.min(n)).enumerate() {
        *slot = polyval(&head_fit, i as f64);
    }

    // Tail: fit the last window
    if n > half {
        let tail_fit = polyfit(&xs, &values[n - window..], polyorder);
        for i in (n - half.min(n)).max(half)..n {
            let x = (i + window - n) as f64;
            out[i] = polyval(&tail_fit, x);
        }
    }

    out
}

/// Convolution coefficients that evaluate the fitted polynomial at the
/// window center. Derived by fitting each unit impulse in the window.
fn savgol_center_coefficients(window: usize, polyorder: usize) -> Vec<f64> {
    let half = window as isize / 2;
    let xs: Vec<f64> = (-half..=half).map(|i| i as f64).collect();

    (0..window)
        .map(|i| {
            let mut impulse = vec![0.0; window];
            impulse[i] = 1.0;
            let fit = polyfit(&xs, &impulse, polyorder);
            fit[0]
        })
        .collect()
}

/// Least-squares polynomial fit via normal equations.
///
/// Returns coefficients `[b0, b1, ..., b_order]` for
/// `p(x) = b0 + b1*x + ... + b_order*x^order`.
fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> Vec<f64> {
    let m = order + 1;

    // Normal equations: (A^T A) b = A^T y with A[i][j] = xs[i]^j
    let mut ata = vec![vec![0.0; m]; m];
    let mut aty = vec![0.0; m];

    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let mut powers = vec![1.0; 2 * m - 1];
        for p in 1..2 * m - 1 {
            powers[p] = powers[p - 1] * x;
        }
        for r in 0..m {
            for c in 0..m {
                ata[r][c] += powers[r + c];
            }
            aty[r] += powers[r] * y;
        }
    }

    solve_linear(ata, aty)
}

/// Gaussian elimination with partial pivoting on a small dense system.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let m = b.len();

    for col in 0..m {
        let mut pivot = col;
        for row in col + 1..m {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let diag = a[col][col];
        if diag.abs() < 1e-300 {
            continue;
        }

        for row in col + 1..m {
            let factor = a[row][col] / diag;
            for c in col..m {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let mut acc = b[row];
        for c in row + 1..m {
            acc -= a[row][c] * x[c];
        }
        if a[row][row].abs() >= 1e-300 {
            x[row] = acc / a[row][row];
        }
    }

    x
}

fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}
