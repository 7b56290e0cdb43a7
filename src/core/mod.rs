//! Core module - the realtime sync pipeline
//!
//! This module uses **explicit re-exports** instead of glob exports
//! (`pub use module::*`) so the public API only changes on purpose.
//!
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{BoundedMergeBuffer, IntelligenceFeed, ValuationLiveActor};
//! ```

pub mod alarm;
pub mod buffer;
pub mod cache_sync;
pub mod decoder;
pub mod filter;
pub mod intelligence;
pub mod logging;
pub mod reconnect;
pub mod registry;
pub mod stream;
pub mod threshold;
pub mod types;
pub mod valuation;

// Explicit re-exports for types module
pub use types::{
    parse_timestamp, ComponentImpact, Confidence, ConfidenceLevel, ConnectionStatus, DomainRecord,
    HistoryPoint, Instrument, RawFrame, ValuationSnapshot, DEFAULT_AUTHOR, MAX_URGENCY_SCORE,
};

// Explicit re-exports for decoding and merging
pub use buffer::{BoundedMergeBuffer, MergeOutcome, DEFAULT_BUFFER_CAPACITY};
pub use cache_sync::{DurableCacheSync, PersistOutcome};
pub use decoder::{FrameDecoder, IntelligenceDecoder, ValuationDecoder};
pub use filter::{FilterMode, RecordFilter, SeenRecords};

// Explicit re-exports for threshold and alarm modules
pub use alarm::{AlarmDebouncer, AlarmState, DebounceState, ResetPolicy};
pub use threshold::{VolatilityThresholdEstimator, DEFAULT_FALLBACK_THRESHOLD, MAX_HISTORY_WINDOW};

// Explicit re-exports for connection handling
pub use reconnect::{
    FrameHandler, ReconnectLoop, ReconnectPolicy, ReconnectStats, DEFAULT_RECONNECT_DELAY_SECS,
};
pub use stream::{LiveFrames, StreamConnectionManager};

// Explicit re-exports for feeds and actors
pub use intelligence::{
    FeedView, IntelligenceDeps, IntelligenceFeed, IntelligenceFeedConfig, IntelligenceFeedHandle,
};
pub use registry::ValuationRegistry;
pub use valuation::{ActorState, ValuationDeps, ValuationLiveActor, ValuationSettings};

// Explicit re-exports for logging module
pub use logging::SanitizedValue;
