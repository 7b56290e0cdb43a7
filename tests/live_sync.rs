//! End-to-end scenarios for the sync pipeline
//!
//! The first test runs the real SSE transport, REST client and JSON cache
//! against a mock HTTP server. The others drive the feed and the valuation
//! actor through an in-process transport with paused time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use alpha_sync::adapters::{
    CredentialStore, DurableStore, FetchResult, FrameStream, FrameTransport,
    IntelligenceHistorySource, JsonFileStore, MemoryStore, Notifier, NotifyError, RestClient,
    SseTransport, StaticCredentials, StreamError, StreamResult, ValuationHistorySource,
};
use alpha_sync::config::load_config_from_str;
use alpha_sync::core::{
    ActorState, ConnectionStatus, HistoryPoint, IntelligenceDeps, IntelligenceFeed,
    IntelligenceFeedConfig, Instrument, RawFrame, ValuationDeps, ValuationLiveActor,
    ValuationSettings,
};

// =============================================================================
// In-process collaborators
// =============================================================================

/// Fails the first `failures` opens, then streams whatever the test sends
struct FlakyTransport {
    failures: AtomicUsize,
    frames: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    opened_at: Mutex<Vec<tokio::time::Instant>>,
}

impl FlakyTransport {
    fn new(failures: usize) -> (Arc<Self>, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            failures: AtomicUsize::new(failures),
            frames: Mutex::new(Some(rx)),
            opened_at: Mutex::new(Vec::new()),
        });
        (transport, tx)
    }

    fn opened_at(&self) -> Vec<tokio::time::Instant> {
        self.opened_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameTransport for FlakyTransport {
    async fn open(&self, _endpoint: &str, _token: Option<&str>) -> StreamResult<FrameStream> {
        self.opened_at.lock().unwrap().push(tokio::time::Instant::now());

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StreamError::ConnectionFailed("connection refused".to_string()));
        }

        match self.frames.lock().unwrap().take() {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|payload| (Ok(RawFrame::new(payload)), rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, f64, f64)>>,
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(
        &self,
        instrument_name: &str,
        change_pct: f64,
        threshold: f64,
    ) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((instrument_name.to_string(), change_pct, threshold));
        Ok(())
    }
}

struct FixedHistory(Vec<f64>);

#[async_trait]
impl ValuationHistorySource for FixedHistory {
    async fn fetch_history(&self, _code: &str, limit: usize) -> FetchResult<Vec<HistoryPoint>> {
        Ok(self
            .0
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, growth)| HistoryPoint {
                date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                growth: Some(*growth),
            })
            .collect())
    }
}

fn record_json(id: i64, timestamp: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "timestamp": timestamp,
        "urgency_score": 9,
        "sentiment_label": "Bearish",
        "summary": { "zh": format!("快讯 {}", id), "en": format!("Flash {}", id) },
        "content": "Body",
        "gold_price_snapshot": 2310.5
    })
}

fn snapshot_frame(code: &str, growth: f64) -> String {
    serde_json::json!({
        "fund_code": code,
        "fund_name": "Liquor Index",
        "estimated_growth": growth,
        "total_weight": 88.0,
        "components": [
            {
                "code": "600519",
                "name": "Moutai",
                "weight": 15.0,
                "change_pct": growth,
                "impact": growth * 0.15
            }
        ],
        "confidence": { "level": "high", "score": 90 },
        "timestamp": "2026-03-02 10:15:00+08:00"
    })
    .to_string()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_intelligence_feed_over_sse_with_history_and_cache() {
    let mut server = mockito::Server::new_async().await;
    let history_body =
        serde_json::json!({ "data": [record_json(1, "2026-03-02T08:00:00Z")] }).to_string();
    let _history = server
        .mock("GET", "/api/v1/mobile/intelligence")
        .match_query(mockito::Matcher::UrlEncoded("limit".into(), "50".into()))
        .with_status(200)
        .with_body(history_body)
        .create_async()
        .await;

    let batch = serde_json::json!({
        "type": "intelligence_update",
        "data": [record_json(2, "2026-03-02 09:00:00"), record_json(1, "2026-03-02T08:00:00Z")],
        "count": 2,
        "latest_id": 2
    });
    let sse_body = format!(
        "data: {{\"type\":\"connected\"}}\n\ndata: not json\n\ndata: {}\n\n",
        batch
    );
    let _stream = server
        .mock("GET", "/api/v1/mobile/intelligence/stream")
        .match_header("authorization", "Bearer secret-token")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse_body)
        .create_async()
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let cache_path = dir.path().join("intelligence.json");
    let yaml = format!(
        "api:\n  base_url: {}\nfeed:\n  cache_path: {}\n",
        server.url(),
        cache_path.display()
    );
    let config = load_config_from_str(&yaml).unwrap();

    let credentials: Arc<dyn CredentialStore> =
        Arc::new(StaticCredentials::new().with("access_token", "secret-token"));
    let rest = RestClient::new(
        config.api.base_url.clone(),
        config.api.rest_paths(),
        credentials.clone(),
        config.api.token_key.clone(),
    )
    .unwrap();
    let store = Arc::new(JsonFileStore::open(&cache_path).await.unwrap());

    let mut feed = IntelligenceFeed::spawn(
        config.intelligence_feed_config(),
        IntelligenceDeps {
            transport: Arc::new(SseTransport::new().unwrap()),
            history: Some(Arc::new(rest) as Arc<dyn IntelligenceHistorySource>),
            store: store.clone(),
            credentials,
        },
    );

    let mut rx = feed.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|v| v.records.len() == 2))
        .await
        .expect("feed did not deliver")
        .unwrap()
        .clone();
    feed.stop().await;

    let ids: Vec<i64> = view.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(view.records[0].summary, "快讯 2");
    assert_eq!(view.records[0].sentiment, "Bearish");
    assert_eq!(view.records[0].author, "AlphaSignal");
    assert_eq!(view.records[1].price_snapshot, Some(2310.5));

    let reopened = JsonFileStore::open(&cache_path).await.unwrap();
    let cached: Vec<i64> = reopened.load_recent(10).await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(cached, vec![2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_three_failures_waits_fixed_delays() {
    let (transport, tx) = FlakyTransport::new(3);
    let mut feed = IntelligenceFeed::spawn(
        IntelligenceFeedConfig::new("http://intel.local/stream"),
        IntelligenceDeps {
            transport: transport.clone(),
            history: None,
            store: Arc::new(MemoryStore::new()),
            credentials: Arc::new(StaticCredentials::new()),
        },
    );

    let mut status = feed.status_receiver();
    status.wait_for(|s| *s == ConnectionStatus::Live).await.unwrap();

    let opened = transport.opened_at();
    assert_eq!(opened.len(), 4);
    for pair in opened.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
    }

    let frame = serde_json::json!({ "data": [record_json(7, "2026-03-02T08:00:00Z")] }).to_string();
    tx.send(frame).unwrap();
    let mut rx = feed.subscribe();
    rx.wait_for(|v| v.records.len() == 1).await.unwrap();

    let stats = feed.stop().await.unwrap();
    assert_eq!(stats.attempts, 4);
    assert_eq!(stats.failures, 3);
}

#[tokio::test(start_paused = true)]
async fn test_valuation_alarm_fires_once_per_window() {
    let history = vec![0.1, -0.2, 0.3, -0.1, 0.2];
    let threshold = 2.0 * 0.0344_f64.sqrt();

    let (transport, tx) = FlakyTransport::new(0);
    let notifier = Arc::new(Recorder::default());
    let mut actor = ValuationLiveActor::new(
        Instrument::new("161725", "Liquor Index"),
        ValuationSettings::new("http://host/api/funds/{code}/valuation/stream"),
        ValuationDeps {
            transport,
            history: Arc::new(FixedHistory(history)),
            notifier: notifier.clone(),
            credentials: Arc::new(StaticCredentials::new()),
        },
    );
    let mut snapshots = actor.subscribe();
    actor.start();

    let values = [2.0 * threshold, 3.0 * threshold, 0.5 * threshold, 5.0 * threshold];
    for value in values {
        tx.send(snapshot_frame("161725", value)).unwrap();
    }
    snapshots
        .wait_for(|s| s.as_ref().map(|s| s.estimated_growth_pct) == Some(values[3]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = notifier.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "Liquor Index");
    assert_eq!(calls[0].1, values[0]);
    assert!((calls[0].2 - threshold).abs() < 1e-12);
    assert!(actor.is_live());

    actor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stopped_actor_emits_nothing() {
    let (transport, tx) = FlakyTransport::new(0);
    let notifier = Arc::new(Recorder::default());
    let mut actor = ValuationLiveActor::new(
        Instrument::new("005827", ""),
        ValuationSettings::new("http://host/api/funds/{code}/valuation/stream"),
        ValuationDeps {
            transport,
            history: Arc::new(FixedHistory(Vec::new())),
            notifier: notifier.clone(),
            credentials: Arc::new(StaticCredentials::new()),
        },
    );
    let mut snapshots = actor.subscribe();
    actor.start();

    tx.send(snapshot_frame("005827", 0.4)).unwrap();
    snapshots.wait_for(|s| s.is_some()).await.unwrap();

    actor.stop().await;
    assert_eq!(actor.state(), ActorState::Stopped);
    snapshots.borrow_and_update();

    let _ = tx.send(snapshot_frame("005827", 9.9));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(!snapshots.has_changed().unwrap());
    assert!(actor.snapshot().is_none());
    assert!(notifier.calls.lock().unwrap().is_empty());
    assert!(!actor.is_live());
}
