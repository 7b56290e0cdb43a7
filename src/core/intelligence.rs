//! Intelligence feed
//!
//! One task owns the feed end to end: cold-start read from the durable
//! cache, initial REST history, then the reconnect loop. Every batch goes
//! decoder -> merge buffer -> published view -> durable cache. The buffer is
//! only touched by that task, so merges are serialized without a lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::traits::{
    CredentialStore, DurableStore, FrameTransport, IntelligenceHistorySource,
};
use crate::core::buffer::{BoundedMergeBuffer, MergeOutcome, DEFAULT_BUFFER_CAPACITY};
use crate::core::cache_sync::DurableCacheSync;
use crate::core::decoder::{FrameDecoder, IntelligenceDecoder};
use crate::core::reconnect::{FrameHandler, ReconnectLoop, ReconnectPolicy, ReconnectStats};
use crate::core::stream::StreamConnectionManager;
use crate::core::types::{ConnectionStatus, DomainRecord, RawFrame};

const FEED_NAME: &str = "intelligence";

/// Default number of records requested from the history endpoint
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct IntelligenceFeedConfig {
    pub endpoint: String,
    pub token_key: String,
    pub capacity: usize,
    pub history_limit: usize,
    pub reconnect: ReconnectPolicy,
    pub stall_timeout: Option<Duration>,
}

impl IntelligenceFeedConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token_key: "access_token".to_string(),
            capacity: DEFAULT_BUFFER_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            reconnect: ReconnectPolicy::default(),
            stall_timeout: None,
        }
    }
}

/// Collaborators injected into the feed
#[derive(Clone)]
pub struct IntelligenceDeps {
    pub transport: Arc<dyn FrameTransport>,
    pub history: Option<Arc<dyn IntelligenceHistorySource>>,
    pub store: Arc<dyn DurableStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// What observers should render
#[derive(Debug, Clone, Default)]
pub struct FeedView {
    /// Newest first, at most the buffer capacity
    pub records: Arc<Vec<DomainRecord>>,
    /// True while the live buffer is still empty and the durable cache fills in
    pub from_cache: bool,
}

struct IntelligencePipeline {
    decoder: IntelligenceDecoder,
    buffer: BoundedMergeBuffer,
    cache: DurableCacheSync,
    view: watch::Sender<FeedView>,
    cancel: CancellationToken,
}

impl IntelligencePipeline {
    async fn ingest(&mut self, records: Vec<DomainRecord>) -> MergeOutcome {
        let outcome = self.buffer.merge_detailed(records);
        if outcome.accepted.is_empty() {
            return outcome;
        }

        self.view.send_replace(FeedView {
            records: Arc::new(self.buffer.view().to_vec()),
            from_cache: false,
        });
        debug!(
            feed = FEED_NAME,
            accepted = outcome.accepted.len(),
            evicted = outcome.evicted.len(),
            buffered = self.buffer.len(),
            "Merged batch"
        );

        self.cache.persist(&outcome.accepted).await;
        outcome
    }
}

#[async_trait]
impl FrameHandler for IntelligencePipeline {
    async fn on_frame(&mut self, frame: RawFrame) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(records) = self.decoder.decode(&frame) {
            self.ingest(records).await;
        }
    }
}

pub struct IntelligenceFeed;

impl IntelligenceFeed {
    /// Start the feed on its own task
    pub fn spawn(config: IntelligenceFeedConfig, deps: IntelligenceDeps) -> IntelligenceFeedHandle {
        let cancel = CancellationToken::new();
        let (view_tx, view_rx) = watch::channel(FeedView::default());
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_feed(config, deps, view_tx, Arc::new(status_tx), task_cancel).await
        });

        IntelligenceFeedHandle {
            view: view_rx,
            status: status_rx,
            cancel,
            task: Some(task),
        }
    }
}

async fn run_feed(
    config: IntelligenceFeedConfig,
    deps: IntelligenceDeps,
    view: watch::Sender<FeedView>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    cancel: CancellationToken,
) -> ReconnectStats {
    let cache = DurableCacheSync::new(deps.store.clone());

    let cached = cache.load_recent(config.capacity).await;
    if !cached.is_empty() {
        info!(
            feed = FEED_NAME,
            count = cached.len(),
            "Showing cached records until the stream delivers"
        );
        view.send_replace(FeedView {
            records: Arc::new(cached),
            from_cache: true,
        });
    }

    let mut pipeline = IntelligencePipeline {
        decoder: IntelligenceDecoder::new(),
        buffer: BoundedMergeBuffer::new(config.capacity),
        cache,
        view,
        cancel: cancel.clone(),
    };

    if let Some(history) = deps.history.as_ref() {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReconnectStats::default(),
            fetched = history.fetch_recent(config.history_limit) => fetched,
        };
        match fetched {
            Ok(records) => {
                let outcome = pipeline.ingest(records).await;
                info!(
                    feed = FEED_NAME,
                    accepted = outcome.accepted.len(),
                    "Initial history merged"
                );
            }
            Err(e) => warn!(feed = FEED_NAME, error = %e, "Initial history fetch failed"),
        }
    }

    let manager = StreamConnectionManager::new(FEED_NAME, deps.transport.clone(), cancel)
        .with_stall_timeout(config.stall_timeout);
    let reconnect = ReconnectLoop::new(
        manager,
        config.endpoint.clone(),
        deps.credentials.clone(),
        config.token_key.clone(),
        status,
    )
    .with_policy(config.reconnect.clone());

    reconnect.run(&mut pipeline).await
}

/// Observer and lifecycle handle of a running intelligence feed
pub struct IntelligenceFeedHandle {
    view: watch::Receiver<FeedView>,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<ReconnectStats>>,
}

impl IntelligenceFeedHandle {
    /// Current ordered records (live buffer, or cache while it is empty)
    pub fn records(&self) -> Arc<Vec<DomainRecord>> {
        self.view.borrow().records.clone()
    }

    pub fn view(&self) -> FeedView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every published view
    pub fn subscribe(&self) -> watch::Receiver<FeedView> {
        self.view.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Tear the feed down and wait for its task
    pub async fn stop(&mut self) -> Option<ReconnectStats> {
        self.cancel.cancel();
        let task = self.task.take()?;
        match task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(feed = FEED_NAME, error = %e, "Feed task ended abnormally");
                None
            }
        }
    }
}

impl Drop for IntelligenceFeedHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
