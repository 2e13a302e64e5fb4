//! Error types for the radar scope pipeline.
//!
//! Each subsystem gets its own structured error enum; the top-level
//! [`ScopeError`] folds them together for callers that don't care which
//! stage failed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all radar scope operations.
#[derive(Error, Debug)]
pub enum ScopeError {
    /// Capture file decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serial angle feed errors
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// Worker thread errors
    #[error("Worker thread error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture-file decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read capture file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config format in '{path}': {source}")]
    InvalidFormat {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to save config to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Serial angle feed errors
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Failed to open serial port '{port}': {source}")]
    OpenFailed {
        port: String,
        source: serialport::Error,
    },

    #[error("Serial read failed: {source}")]
    ReadFailed { source: std::io::Error },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker thread '{name}' did not stop within the join timeout")]
    JoinTimeout { name: String },
}

/// Result type alias for radar scope operations
pub type Result<T, E = ScopeError> = std::result::Result<T, E>;
