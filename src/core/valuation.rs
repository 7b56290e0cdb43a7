//! ValuationLiveActor - live valuation lifecycle for one instrument
//!
//! `start()` spawns one activation task: calibrate the 2-sigma threshold
//! from history, then stream snapshots through the reconnect loop. Each
//! snapshot replaces the previous one and is run through the alarm
//! debouncer; a fire spawns the notification so delivery never blocks the
//! stream. Notifications run on the activation's `JoinSet` and race the
//! cancellation token. `stop()` cancels and joins the task, which shuts the
//! set down first, so no snapshot or alarm is emitted once it returns.
//!
//! State machine: `Idle -> Starting -> Live -> Stopping -> Stopped`, and
//! `Stopped -> Starting` on the next `start()`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::rest::CODE_PLACEHOLDER;
use crate::adapters::traits::{CredentialStore, FrameTransport, Notifier, ValuationHistorySource};
use crate::core::alarm::{AlarmDebouncer, AlarmState, ResetPolicy};
use crate::core::decoder::{FrameDecoder, ValuationDecoder};
use crate::core::reconnect::{FrameHandler, ReconnectLoop, ReconnectPolicy};
use crate::core::stream::StreamConnectionManager;
use crate::core::threshold::{
    VolatilityThresholdEstimator, DEFAULT_FALLBACK_THRESHOLD, MAX_HISTORY_WINDOW,
};
use crate::core::types::{ConnectionStatus, Instrument, RawFrame, ValuationSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Idle,
    Starting,
    Live,
    Stopping,
    Stopped,
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorState::Idle => "idle",
            ActorState::Starting => "starting",
            ActorState::Live => "live",
            ActorState::Stopping => "stopping",
            ActorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Per-actor settings shared by every instrument
#[derive(Debug, Clone)]
pub struct ValuationSettings {
    /// Stream endpoint with a `{code}` placeholder
    pub endpoint_template: String,
    pub token_key: String,
    pub reconnect: ReconnectPolicy,
    pub stall_timeout: Option<Duration>,
    pub history_window: usize,
    pub fallback_threshold: f64,
    pub alarm_enabled: bool,
    pub reset: ResetPolicy,
}

impl ValuationSettings {
    pub fn new(endpoint_template: impl Into<String>) -> Self {
        Self {
            endpoint_template: endpoint_template.into(),
            token_key: "access_token".to_string(),
            reconnect: ReconnectPolicy::default(),
            stall_timeout: None,
            history_window: MAX_HISTORY_WINDOW,
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            alarm_enabled: true,
            reset: ResetPolicy::default(),
        }
    }

    pub fn endpoint_for(&self, instrument_code: &str) -> String {
        self.endpoint_template.replace(CODE_PLACEHOLDER, instrument_code)
    }

    fn estimator(&self) -> VolatilityThresholdEstimator {
        VolatilityThresholdEstimator::new(self.history_window, self.fallback_threshold)
    }
}

/// Collaborators injected into every actor
#[derive(Clone)]
pub struct ValuationDeps {
    pub transport: Arc<dyn FrameTransport>,
    pub history: Arc<dyn ValuationHistorySource>,
    pub notifier: Arc<dyn Notifier>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// Observable state, kept across activations so receivers stay valid
struct Shared {
    state: watch::Sender<ActorState>,
    snapshot: watch::Sender<Option<ValuationSnapshot>>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    threshold: watch::Sender<Option<f64>>,
    alarm: watch::Sender<AlarmState>,
}

pub struct ValuationLiveActor {
    instrument: Instrument,
    settings: ValuationSettings,
    deps: ValuationDeps,
    shared: Arc<Shared>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl ValuationLiveActor {
    pub fn new(instrument: Instrument, settings: ValuationSettings, deps: ValuationDeps) -> Self {
        let shared = Shared {
            state: watch::channel(ActorState::Idle).0,
            snapshot: watch::channel(None).0,
            status: Arc::new(watch::channel(ConnectionStatus::Disconnected).0),
            threshold: watch::channel(None).0,
            alarm: watch::channel(AlarmState {
                armed: settings.alarm_enabled,
                fired_today: false,
            })
            .0,
        };
        Self {
            instrument,
            settings,
            deps,
            shared: Arc::new(shared),
            cancel: None,
            task: None,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Begin an activation; no-op while one is already running
    pub fn start(&mut self) -> bool {
        if matches!(*self.shared.state.borrow(), ActorState::Starting | ActorState::Live) {
            return false;
        }

        self.shared.state.send_replace(ActorState::Starting);
        self.shared.snapshot.send_replace(None);
        self.shared.threshold.send_replace(None);
        self.shared.alarm.send_replace(AlarmState {
            armed: self.settings.alarm_enabled,
            fired_today: false,
        });

        let cancel = CancellationToken::new();
        let activation = Activation {
            instrument: self.instrument.clone(),
            settings: self.settings.clone(),
            deps: self.deps.clone(),
            shared: self.shared.clone(),
            cancel: cancel.clone(),
        };
        self.task = Some(tokio::spawn(activation.run()));
        self.cancel = Some(cancel);

        info!(instrument = %self.instrument.code, "Valuation actor started");
        true
    }

    /// Cancel the activation and wait until it has fully wound down
    pub async fn stop(&mut self) -> bool {
        let Some(cancel) = self.cancel.take() else {
            return false;
        };

        self.shared.state.send_replace(ActorState::Stopping);
        cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(
                    instrument = %self.instrument.code,
                    error = %e,
                    "Valuation task ended abnormally"
                );
            }
        }

        self.shared.snapshot.send_replace(None);
        self.shared.status.send_replace(ConnectionStatus::Disconnected);
        self.shared.state.send_replace(ActorState::Stopped);
        info!(instrument = %self.instrument.code, "Valuation actor stopped");
        true
    }

    pub fn state(&self) -> ActorState {
        *self.shared.state.borrow()
    }

    /// Activation running and its stream connected
    pub fn is_live(&self) -> bool {
        self.state() == ActorState::Live && *self.shared.status.borrow() == ConnectionStatus::Live
    }

    pub fn snapshot(&self) -> Option<ValuationSnapshot> {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ValuationSnapshot>> {
        self.shared.snapshot.subscribe()
    }

    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ActorState> {
        self.shared.state.subscribe()
    }

    /// Threshold of the current activation, once calibrated
    pub fn threshold(&self) -> Option<f64> {
        *self.shared.threshold.borrow()
    }

    pub fn alarm_state(&self) -> AlarmState {
        *self.shared.alarm.borrow()
    }

    /// Refetch history and recompute the threshold for the running activation
    pub async fn refresh_threshold(&self) -> f64 {
        let threshold =
            calibrate(&self.instrument.code, &self.settings, self.deps.history.as_ref()).await;
        self.shared.threshold.send_replace(Some(threshold));
        info!(instrument = %self.instrument.code, threshold, "Threshold refreshed");
        threshold
    }
}

impl Drop for ValuationLiveActor {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

/// History fetch + threshold; falls back to the configured constant on failure
async fn calibrate(
    code: &str,
    settings: &ValuationSettings,
    history: &dyn ValuationHistorySource,
) -> f64 {
    let estimator = settings.estimator();
    match history.fetch_history(code, settings.history_window).await {
        Ok(points) => estimator.compute_from_history(&points),
        Err(e) => {
            warn!(
                instrument = code,
                error = %e,
                fallback = estimator.fallback(),
                "History fetch failed, using fallback threshold"
            );
            estimator.fallback()
        }
    }
}

struct Activation {
    instrument: Instrument,
    settings: ValuationSettings,
    deps: ValuationDeps,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Activation {
    async fn run(self) {
        let code = self.instrument.code.clone();

        let threshold = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            threshold = calibrate(&code, &self.settings, self.deps.history.as_ref()) => threshold,
        };
        self.shared.threshold.send_replace(Some(threshold));
        self.shared.state.send_if_modified(|state| {
            if *state == ActorState::Starting {
                *state = ActorState::Live;
                true
            } else {
                false
            }
        });
        info!(instrument = %code, threshold, "Valuation threshold calibrated");

        let manager = StreamConnectionManager::new(
            format!("valuation:{}", code),
            self.deps.transport.clone(),
            self.cancel.clone(),
        )
        .with_stall_timeout(self.settings.stall_timeout);
        let reconnect = ReconnectLoop::new(
            manager,
            self.settings.endpoint_for(&code),
            self.deps.credentials.clone(),
            self.settings.token_key.clone(),
            self.shared.status.clone(),
        )
        .with_policy(self.settings.reconnect.clone());

        let mut pipeline = ValuationPipeline {
            decoder: ValuationDecoder::new(code),
            debouncer: AlarmDebouncer::new(self.settings.alarm_enabled, self.settings.reset),
            fallback: self.settings.fallback_threshold,
            instrument: self.instrument,
            notifier: self.deps.notifier,
            shared: self.shared,
            cancel: self.cancel,
            pending: JoinSet::new(),
        };
        reconnect.run(&mut pipeline).await;

        // In-flight notifications must not outlive the activation
        pipeline.pending.shutdown().await;
    }
}

struct ValuationPipeline {
    decoder: ValuationDecoder,
    debouncer: AlarmDebouncer,
    fallback: f64,
    instrument: Instrument,
    notifier: Arc<dyn Notifier>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    pending: JoinSet<()>,
}

impl ValuationPipeline {
    fn display_name(&self, snapshot: &ValuationSnapshot) -> String {
        if !self.instrument.name.trim().is_empty() {
            return self.instrument.name.clone();
        }
        snapshot
            .instrument_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.instrument.display_name().to_string())
    }

    fn dispatch_alarm(&mut self, name: String, value: f64, threshold: f64) {
        let notifier = self.notifier.clone();
        let code = self.instrument.code.clone();
        let cancel = self.cancel.clone();
        self.pending.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(instrument = %code, "Alarm notification dropped on stop");
                }
                result = notifier.notify(&name, value, threshold) => {
                    if let Err(e) = result {
                        warn!(instrument = %code, error = %e, "Alarm notification failed");
                    }
                }
            }
        });
    }
}

#[async_trait]
impl FrameHandler for ValuationPipeline {
    async fn on_frame(&mut self, frame: RawFrame) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(snapshot) = self.decoder.decode(&frame) else {
            return;
        };

        let value = snapshot.estimated_growth_pct;
        let threshold = self.shared.threshold.borrow().unwrap_or(self.fallback);
        let name = self.display_name(&snapshot);
        self.shared.snapshot.send_replace(Some(snapshot));

        let fired = self.debouncer.evaluate(value, threshold);
        let alarm = self.debouncer.state();
        self.shared.alarm.send_if_modified(|current| {
            if *current != alarm {
                *current = alarm;
                true
            } else {
                false
            }
        });

        if fired {
            warn!(
                instrument = %self.instrument.code,
                value,
                threshold,
                "Valuation crossed the 2-sigma band"
            );
            self.dispatch_alarm(name, value, threshold);
        }
    }
}
