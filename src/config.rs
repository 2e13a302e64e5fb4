//! Application configuration system with TOML persistence.
//!
//! Supports loading from file with sensible defaults matching the deployed
//! acquisition hardware (20 MHz two-channel ADC, ESP32 angle feed).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Capture file and ADC parameters
    pub acquisition: AcquisitionConfig,

    /// Spectrum analysis configuration
    pub spectrum: SpectrumConfig,

    /// Peak/target detection configuration
    pub detection: DetectionConfig,

    /// Serial angle feed configuration
    pub serial: SerialConfig,

    /// Worker thread configuration
    pub worker: WorkerConfig,

    /// Target history configuration
    pub history: HistoryConfig,
}

/// Data acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Path to the capture file periodically rewritten by the acquisition
    /// process
    pub capture_path: PathBuf,

    /// ADC sample rate in Hz
    pub sample_rate_hz: f64,
}

/// FFT / spectrum processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumConfig {
    /// Window function name ("hann", "hamming", "blackman", "none").
    /// Unknown names fall back to no window.
    pub window: String,

    /// Enable spectrum smoothing to reduce noise grass
    pub smoothing_enabled: bool,

    /// Smoothing method ("moving_average" or "savgol")
    pub smoothing_method: String,

    /// Moving average window size in bins
    pub smoothing_window: usize,

    /// Savitzky-Golay window length in bins (must be odd)
    pub savgol_window: usize,

    /// Savitzky-Golay polynomial order
    pub savgol_polyorder: usize,

    /// Optional dB floor clamp applied after smoothing
    pub floor_db: Option<f64>,
}

/// Extrema and target detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Number of top peaks/valleys to report
    pub n_extrema: usize,

    /// Prominence threshold for peak detection in dB
    pub prominence_db: f64,

    /// Minimum distance between accepted peaks in FFT bins
    pub min_distance_bins: usize,

    /// Frequency threshold for target detection in kHz
    pub target_freq_threshold_khz: f64,

    /// FFT bin index threshold for the filtered extrema tables
    pub filtered_index_threshold: usize,

    /// Maximum reportable target range in meters
    pub max_range_m: f64,

    /// Divisor applied to the combined peak metric in the distance heuristic
    pub distance_scale: f64,
}

/// Serial angle feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port device path
    pub port: String,

    /// Baud rate (must match the rotator firmware)
    pub baud: u32,

    /// Read timeout in milliseconds; also bounds how often the stop flag
    /// is observed while blocked on a read
    pub timeout_ms: u64,

    /// Delay before retrying a failed connection, in milliseconds
    pub reconnect_backoff_ms: u64,

    /// Minimum raw angle delta treated as real movement, in degrees
    pub angle_eps_deg: f64,
}

/// Worker thread configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Capture file poll interval for the spectrum worker, in milliseconds
    pub spectrum_poll_interval_ms: u64,

    /// Capture file poll interval for the waveform worker, in milliseconds
    pub waveform_poll_interval_ms: u64,

    /// Grace period between setting the stop flag and joining, in milliseconds
    pub shutdown_grace_ms: u64,

    /// Maximum time to wait for each worker thread to join, in milliseconds
    pub join_timeout_ms: u64,
}

/// Target history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of targets kept in the ring buffer
    pub capacity: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            capture_path: PathBuf::from("live/live_acquisition_ui.bin"),
            sample_rate_hz: 20_000_000.0,
        }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            window: "hann".to_string(),
            smoothing_enabled: true,
            smoothing_method: "moving_average".to_string(),
            smoothing_window: 11,
            savgol_window: 51,
            savgol_polyorder: 3,
            floor_db: Some(0.0),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            n_extrema: 5,
            prominence_db: 3.0,
            min_distance_bins: 1,
            target_freq_threshold_khz: 10_000.0,
            filtered_index_threshold: 2000,
            max_range_m: 15.0,
            distance_scale: 1000.0,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            timeout_ms: 1000,
            reconnect_backoff_ms: 5000,
            angle_eps_deg: 1e-3,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            spectrum_poll_interval_ms: 100,
            waveform_poll_interval_ms: 50,
            shutdown_grace_ms: 500,
            join_timeout_ms: 2000,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

impl WorkerConfig {
    pub fn spectrum_poll_interval(&self) -> Duration {
        Duration::from_millis(self.spectrum_poll_interval_ms)
    }

    pub fn waveform_poll_interval(&self) -> Duration {
        Duration::from_millis(self.waveform_poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::InvalidFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::SaveFailed {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let contents =
            toml::to_string_pretty(self).expect("Config serialization should never fail");

        std::fs::write(path, contents).map_err(|source| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition.sample_rate_hz <= 0.0 {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "Sample rate {} Hz must be > 0",
                    self.acquisition.sample_rate_hz
                ),
            });
        }

        if self.spectrum.savgol_polyorder >= self.spectrum.savgol_window {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "Savitzky-Golay polyorder {} must be smaller than window {}",
                    self.spectrum.savgol_polyorder, self.spectrum.savgol_window
                ),
            });
        }

        if self.detection.prominence_db <= 0.0 {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "Prominence {} dB must be > 0",
                    self.detection.prominence_db
                ),
            });
        }

        if self.detection.max_range_m <= 0.0 {
            return Err(ConfigError::ValidationFailed {
                reason: format!("Max range {} m must be > 0", self.detection.max_range_m),
            });
        }

        if self.detection.distance_scale <= 0.0 {
            return Err(ConfigError::ValidationFailed {
                reason: "Distance scale must be > 0".to_string(),
            });
        }

        if self.worker.spectrum_poll_interval_ms == 0 || self.worker.waveform_poll_interval_ms == 0
        {
            return Err(ConfigError::ValidationFailed {
                reason: "Poll intervals must be > 0".to_string(),
            });
        }

        if self.history.capacity == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "Target history capacity must be > 0".to_string(),
            });
        }

        Ok(())
    }
}
