//! Start-up values overridable through environment variables

use std::path::PathBuf;

/// Config file path (default: `config.yaml`)
///
/// Environment variable: `ALPHA_SYNC_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::var("ALPHA_SYNC_CONFIG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"))
}

/// Prefix of the env vars holding credentials (default: `ALPHA_`)
///
/// Environment variable: `ALPHA_TOKEN_ENV_PREFIX`
pub fn token_env_prefix() -> String {
    std::env::var("ALPHA_TOKEN_ENV_PREFIX")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "ALPHA_".to_string())
}

/// Interval between status log lines in the binary (default: 60 seconds)
///
/// Environment variable: `ALPHA_STATUS_INTERVAL_SECS`
pub fn status_interval_secs() -> u64 {
    std::env::var("ALPHA_STATUS_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
