//! Alpha Sync - realtime synchronization core
//!
//! - Live intelligence feed: stream, dedup/merge, bounded buffer, durable cache
//! - Per-fund live valuation actors with 2-sigma volatility alarms
//! - Fixed-delay reconnect around every subscription

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;
