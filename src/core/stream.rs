//! StreamConnectionManager - lifecycle of one live subscription
//!
//! Each feed owns its own manager and transport handle. The manager never
//! retries on its own; `core::reconnect` drives the retry loop around it.
//!
//! Cancellation: `cancel()` unblocks any in-flight read, and once it has
//! returned `LiveFrames::next` yields nothing more. Frames received but not
//! yet handed out are dropped.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::adapters::errors::{StreamError, StreamResult};
use crate::adapters::traits::{FrameStream, FrameTransport};
use crate::core::logging::SanitizedValue;
use crate::core::types::RawFrame;

pub struct StreamConnectionManager {
    feed: String,
    transport: Arc<dyn FrameTransport>,
    cancel: CancellationToken,
    stall_timeout: Option<Duration>,
}

impl StreamConnectionManager {
    pub fn new(
        feed: impl Into<String>,
        transport: Arc<dyn FrameTransport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            feed: feed.into(),
            transport,
            cancel,
            stall_timeout: None,
        }
    }

    /// Treat a subscription silent for `timeout` as failed
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    /// Open a subscription, attaching the bearer token when present
    pub async fn subscribe(&self, endpoint: &str, token: Option<&str>) -> StreamResult<LiveFrames> {
        if self.cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        debug!(
            feed = %self.feed,
            endpoint,
            token = ?token.map(SanitizedValue::new),
            "Opening subscription"
        );

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
            opened = self.transport.open(endpoint, token) => opened,
        };
        let inner = opened?;

        info!(feed = %self.feed, endpoint, "Subscription open");
        Ok(LiveFrames {
            inner,
            cancel: self.cancel.clone(),
            stall_timeout: self.stall_timeout,
        })
    }

    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!(feed = %self.feed, "Cancelling subscription");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Frames of one open subscription, gated by the owner's cancellation
pub struct LiveFrames {
    inner: FrameStream,
    cancel: CancellationToken,
    stall_timeout: Option<Duration>,
}

impl LiveFrames {
    /// Next frame in arrival order
    ///
    /// `None` when the stream closed or the owner cancelled. `Err` is a
    /// transport failure (including a stall, when configured).
    pub async fn next(&mut self) -> Option<StreamResult<RawFrame>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let stall_timeout = self.stall_timeout;
        let inner = &mut self.inner;
        let read = async move {
            match stall_timeout {
                Some(limit) => match tokio::time::timeout(limit, inner.next()).await {
                    Ok(item) => item,
                    Err(_) => Some(Err(StreamError::Stalled(limit.as_millis() as u64))),
                },
                None => inner.next().await,
            }
        };

        let item = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            item = read => item,
        };

        // A read that completed concurrently with cancel() is discarded.
        if self.cancel.is_cancelled() {
            return None;
        }
        item
    }
}
