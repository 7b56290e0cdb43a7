//! Collaborator traits
//!
//! Every external dependency of the sync core sits behind one of these
//! traits and is injected into the feed or actor that uses it; there is
//! no global client.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::adapters::errors::{FetchResult, NotifyError, StorageResult, StreamResult};
use crate::core::types::{DomainRecord, HistoryPoint, RawFrame};

/// Frames of one open subscription, in arrival order
pub type FrameStream = BoxStream<'static, StreamResult<RawFrame>>;

/// Opens long-lived frame subscriptions
///
/// Dropping the returned stream must release the underlying connection.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Connect to `endpoint`, attaching `Authorization: Bearer` when a token is given
    async fn open(&self, endpoint: &str, token: Option<&str>) -> StreamResult<FrameStream>;
}

/// Daily growth history for threshold calibration
#[async_trait]
pub trait ValuationHistorySource: Send + Sync {
    async fn fetch_history(
        &self,
        instrument_code: &str,
        limit: usize,
    ) -> FetchResult<Vec<HistoryPoint>>;
}

/// Recent intelligence used to populate the feed before the stream delivers
#[async_trait]
pub trait IntelligenceHistorySource: Send + Sync {
    async fn fetch_recent(&self, limit: usize) -> FetchResult<Vec<DomainRecord>>;
}

/// Read-only bearer token lookup; absence is not an error
pub trait CredentialStore: Send + Sync {
    fn token(&self, key: &str) -> Option<String>;
}

/// User-facing alarm delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        instrument_name: &str,
        change_pct: f64,
        threshold: f64,
    ) -> Result<(), NotifyError>;
}

/// On-device persistent mirror of intelligence records
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn exists(&self, id: i64) -> StorageResult<bool>;

    async fn insert(&self, record: &DomainRecord) -> StorageResult<()>;

    /// Make every insert since the last flush durable
    async fn flush(&self) -> StorageResult<()>;

    /// Most recent records by timestamp, newest first, for cold start
    async fn load_recent(&self, limit: usize) -> StorageResult<Vec<DomainRecord>>;
}
