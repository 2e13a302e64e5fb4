// Library interface for the radar scope pipeline

pub mod angle;
pub mod config;
pub mod consumer;
pub mod decoder;
pub mod error;
pub mod extrema;
pub mod messages;
pub mod metrics;
pub mod range;
pub mod spectrum;
pub mod workers;

// Test fixtures for synthetic capture generation
pub mod test_fixtures;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, ScopeError};
