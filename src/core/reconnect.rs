//! Fixed-delay reconnect loop
//!
//! On any transport failure (refused, non-2xx, stream closed, stall) the
//! loop waits `ReconnectPolicy::delay` and subscribes again. There is no
//! attempt cap and no jitter; the loop ends only when the owning feed's
//! cancellation token fires. Credentials are looked up on every attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::adapters::errors::StreamError;
use crate::adapters::traits::CredentialStore;
use crate::core::stream::StreamConnectionManager;
use crate::core::types::{ConnectionStatus, RawFrame};

/// Delay between a failure and the next subscribe
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            delay: Duration::from_secs(secs),
        }
    }
}

/// Per-feed processing of each frame, in arrival order
#[async_trait]
pub trait FrameHandler: Send {
    async fn on_frame(&mut self, frame: RawFrame);
}

/// Counters for one run of the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectStats {
    pub attempts: u64,
    pub failures: u64,
    pub frames: u64,
}

/// Supervises one feed's subscription until cancelled
pub struct ReconnectLoop {
    manager: StreamConnectionManager,
    endpoint: String,
    credentials: Arc<dyn CredentialStore>,
    token_key: String,
    policy: ReconnectPolicy,
    status: Arc<watch::Sender<ConnectionStatus>>,
}

impl ReconnectLoop {
    pub fn new(
        manager: StreamConnectionManager,
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
        token_key: impl Into<String>,
        status: Arc<watch::Sender<ConnectionStatus>>,
    ) -> Self {
        Self {
            manager,
            endpoint: endpoint.into(),
            credentials,
            token_key: token_key.into(),
            policy: ReconnectPolicy::default(),
            status,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run until cancelled, handing every frame to `handler`
    pub async fn run<H: FrameHandler>(&self, handler: &mut H) -> ReconnectStats {
        let feed = self.manager.feed().to_string();
        let mut stats = ReconnectStats::default();

        info!(feed = %feed, endpoint = %self.endpoint, "Reconnect loop started");

        loop {
            if self.manager.is_cancelled() {
                break;
            }

            stats.attempts += 1;
            self.status.send_replace(ConnectionStatus::Connecting);
            let token = self.credentials.token(&self.token_key);

            match self.manager.subscribe(&self.endpoint, token.as_deref()).await {
                Ok(mut frames) => {
                    self.status.send_replace(ConnectionStatus::Live);
                    while let Some(item) = frames.next().await {
                        match item {
                            Ok(frame) => {
                                stats.frames += 1;
                                handler.on_frame(frame).await;
                            }
                            Err(e) => {
                                warn!(
                                    feed = %feed,
                                    error = %e,
                                    "Subscription failed while reading"
                                );
                                break;
                            }
                        }
                    }
                    if !self.manager.is_cancelled() {
                        stats.failures += 1;
                        info!(feed = %feed, "Subscription ended");
                    }
                }
                Err(StreamError::Cancelled) => break,
                Err(e) => {
                    stats.failures += 1;
                    warn!(feed = %feed, attempt = stats.attempts, error = %e, "Subscribe failed");
                }
            }

            self.status.send_replace(ConnectionStatus::Disconnected);
            if self.manager.is_cancelled() {
                break;
            }

            debug!(
                feed = %feed,
                delay_ms = self.policy.delay.as_millis() as u64,
                "Waiting before reconnect"
            );
            tokio::select! {
                biased;
                _ = self.manager.cancellation().cancelled() => break,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }

        self.status.send_replace(ConnectionStatus::Disconnected);
        info!(
            feed = %feed,
            attempts = stats.attempts,
            failures = stats.failures,
            frames = stats.frames,
            "Reconnect loop stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::StaticCredentials;
    use crate::adapters::test_utils::{ScriptedOutcome, ScriptedTransport};
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Collect {
        frames: Vec<String>,
        stop_after: Option<(usize, CancellationToken)>,
    }

    #[async_trait]
    impl FrameHandler for Collect {
        async fn on_frame(&mut self, frame: RawFrame) {
            self.frames.push(frame.as_str().to_string());
            if let Some((n, token)) = &self.stop_after {
                if self.frames.len() >= *n {
                    token.cancel();
                }
            }
        }
    }

    fn build(
        transport: Arc<ScriptedTransport>,
        cancel: CancellationToken,
    ) -> (ReconnectLoop, watch::Receiver<ConnectionStatus>) {
        let (tx, rx) = watch::channel(ConnectionStatus::Disconnected);
        let manager = StreamConnectionManager::new("test", transport, cancel);
        let credentials = Arc::new(StaticCredentials::new().with("access_token", "tok"));
        let reconnect =
            ReconnectLoop::new(manager, "http://feed", credentials, "access_token", Arc::new(tx));
        (reconnect, rx)
    }

    #[test]
    fn test_default_policy_is_five_seconds() {
        assert_eq!(ReconnectPolicy::default().delay, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_then_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedOutcome::Fail("one".into()),
            ScriptedOutcome::Fail("two".into()),
            ScriptedOutcome::Fail("three".into()),
            ScriptedOutcome::Frames(vec!["resumed".into()]),
        ]));
        let cancel = CancellationToken::new();
        let (reconnect, _rx) = build(transport.clone(), cancel.clone());

        let mut handler = Collect {
            stop_after: Some((1, cancel.clone())),
            ..Collect::default()
        };
        let started = tokio::time::Instant::now();
        let stats = reconnect.run(&mut handler).await;

        assert_eq!(handler.frames, vec!["resumed"]);
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.failures, 3);

        let times = transport.open_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
        assert_eq!(times[3] - started, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_end_triggers_reconnect_with_fresh_token() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            ScriptedOutcome::Frames(vec!["a".into()]),
            ScriptedOutcome::Frames(vec!["b".into()]),
        ]));
        let cancel = CancellationToken::new();
        let (reconnect, _rx) = build(transport.clone(), cancel.clone());

        let mut handler = Collect {
            stop_after: Some((2, cancel.clone())),
            ..Collect::default()
        };
        reconnect.run(&mut handler).await;

        assert_eq!(handler.frames, vec!["a", "b"]);
        assert_eq!(transport.tokens(), vec![Some("tok".to_string()), Some("tok".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_exits_promptly() {
        let transport = Arc::new(ScriptedTransport::new(vec![ScriptedOutcome::Fail(
            "down".into(),
        )]));
        let cancel = CancellationToken::new();
        let (reconnect, rx) = build(transport.clone(), cancel.clone());

        let task = tokio::spawn(async move {
            let mut handler = Collect::default();
            reconnect.run(&mut handler).await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let stats = task.await.unwrap();

        assert_eq!(stats.attempts, 1);
        assert_eq!(transport.open_count(), 1);
        assert_eq!(*rx.borrow(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_is_live_while_subscribed() {
        let (transport, _tx) = ScriptedTransport::channel();
        let transport = Arc::new(transport);
        let cancel = CancellationToken::new();
        let (reconnect, mut rx) = build(transport, cancel.clone());

        let task = tokio::spawn(async move {
            let mut handler = Collect::default();
            reconnect.run(&mut handler).await
        });

        rx.wait_for(|s| *s == ConnectionStatus::Live).await.unwrap();
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionStatus::Disconnected);
    }
}
