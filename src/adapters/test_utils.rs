//! Shared test doubles for the sync core
//!
//! `ScriptedTransport` replays a queue of subscription outcomes so reconnect
//! and cancellation behaviour can be driven deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::adapters::errors::{
    FetchError, FetchResult, NotifyError, StorageError, StorageResult, StreamError, StreamResult,
};
use crate::adapters::traits::{
    DurableStore, FrameStream, FrameTransport, IntelligenceHistorySource, Notifier,
    ValuationHistorySource,
};
use crate::core::types::{DomainRecord, HistoryPoint, RawFrame};

/// What the next `open` call returns
pub enum ScriptedOutcome {
    /// Subscription fails with `ConnectionFailed`
    Fail(String),
    /// Subscription yields these payloads, then ends
    Frames(Vec<String>),
    /// Subscription yields whatever is sent on the channel; ends when the sender drops
    Channel(mpsc::UnboundedReceiver<String>),
}

/// Transport that plays back scripted outcomes in order
///
/// Once the script is exhausted, `open` returns a stream that never yields.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    opens: AtomicUsize,
    tokens: Mutex<Vec<Option<String>>>,
    open_times: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Transport fed by a channel, plus the sender for pushing payloads
    pub fn channel() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(vec![ScriptedOutcome::Channel(rx)]), tx)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn open_times(&self) -> Vec<tokio::time::Instant> {
        self.open_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameTransport for ScriptedTransport {
    async fn open(&self, _endpoint: &str, token: Option<&str>) -> StreamResult<FrameStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(token.map(str::to_string));
        self.open_times.lock().unwrap().push(tokio::time::Instant::now());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(ScriptedOutcome::Fail(reason)) => Err(StreamError::ConnectionFailed(reason)),
            Some(ScriptedOutcome::Frames(payloads)) => {
                Ok(stream::iter(payloads.into_iter().map(|p| Ok(RawFrame::new(p)))).boxed())
            }
            Some(ScriptedOutcome::Channel(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|payload| (Ok(RawFrame::new(payload)), rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}

/// Notifier that records every call
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, f64, f64)>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Records only after sleeping for `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, f64, f64)> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `count` calls were recorded
    pub async fn wait_for(&self, count: usize) -> bool {
        for _ in 0..200 {
            if self.calls.lock().unwrap().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        instrument_name: &str,
        change_pct: f64,
        threshold: f64,
    ) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((instrument_name.to_string(), change_pct, threshold));
        if self.fail {
            return Err(NotifyError::Delivery("scripted failure".to_string()));
        }
        Ok(())
    }
}

/// History source returning fixed data, or failing
#[derive(Default)]
pub struct StaticHistory {
    pub points: Vec<HistoryPoint>,
    pub records: Vec<DomainRecord>,
    pub fail: bool,
    fetches: AtomicUsize,
}

impl StaticHistory {
    pub fn with_points(points: Vec<HistoryPoint>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    pub fn with_records(records: Vec<DomainRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValuationHistorySource for StaticHistory {
    async fn fetch_history(
        &self,
        _instrument_code: &str,
        limit: usize,
    ) -> FetchResult<Vec<HistoryPoint>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Status(503));
        }
        Ok(self.points.iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl IntelligenceHistorySource for StaticHistory {
    async fn fetch_recent(&self, limit: usize) -> FetchResult<Vec<DomainRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Status(503));
        }
        Ok(self.records.iter().take(limit).cloned().collect())
    }
}

/// Store whose every operation fails; counts insert attempts
#[derive(Default)]
pub struct FailingStore {
    pub inserts: AtomicUsize,
    pub flushes: AtomicUsize,
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn exists(&self, _id: i64) -> StorageResult<bool> {
        Ok(false)
    }

    async fn insert(&self, _record: &DomainRecord) -> StorageResult<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable("scripted insert failure".to_string()))
    }

    async fn flush(&self) -> StorageResult<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable("scripted flush failure".to_string()))
    }

    async fn load_recent(&self, _limit: usize) -> StorageResult<Vec<DomainRecord>> {
        Err(StorageError::Unavailable("scripted load failure".to_string()))
    }
}

/// Build a record with a minute-resolution timestamp
pub fn record(id: i64, minute: i64) -> DomainRecord {
    use chrono::{TimeZone, Utc};
    DomainRecord {
        id,
        timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::minutes(minute),
        author: "Desk".to_string(),
        urgency_score: 5,
        sentiment: "Neutral".to_string(),
        summary: format!("record {}", id),
        content: String::new(),
        price_snapshot: None,
    }
}

/// JSON batch frame carrying the given records
pub fn batch_frame(records: &[DomainRecord]) -> String {
    serde_json::json!({ "type": "intelligence_update", "data": records }).to_string()
}
