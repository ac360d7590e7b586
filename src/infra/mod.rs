//! Infrastructure - configuration and run metrics
//!
//! - `config` - Application configuration (TOML loading, defaults, validation)
//! - `metrics` - Per-run counters and summary logging

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::Config;
pub use metrics::{RunMetrics, RunSummary};
