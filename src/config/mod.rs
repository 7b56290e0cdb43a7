//! Configuration module
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `ApiConfig`, `FeedConfig`, `AlarmConfig`)
//! - YAML loading functionality (`load_config`)
//! - Start-up constants with environment variable overrides
//! - Logging initialization

pub mod constants;
pub mod logging;
mod loader;
mod types;

// Re-export types
pub use types::{AlarmConfig, ApiConfig, AppConfig, FeedConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};

pub use logging::init_logging;
