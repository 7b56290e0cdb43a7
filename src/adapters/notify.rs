//! Alarm notifiers
//!
//! `LogNotifier` always works; `WebhookNotifier` POSTs a JSON alert.
//! Callers spawn delivery so a slow or failing notifier never stalls the
//! stream that triggered it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::adapters::errors::NotifyError;
use crate::adapters::traits::Notifier;

const WEBHOOK_TIMEOUT_SECS: u64 = 5;

/// Title and body shown to the user
pub fn alarm_message(instrument_name: &str, change_pct: f64, threshold: f64) -> (String, String) {
    let title = format!("[Volatility alert] {}", instrument_name);
    let body = format!(
        "Intraday estimate {:.2}% crossed the 2-sigma band of {:.2}%",
        change_pct, threshold
    );
    (title, body)
}

/// Emits alarms as structured warn-level log events
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        instrument_name: &str,
        change_pct: f64,
        threshold: f64,
    ) -> Result<(), NotifyError> {
        let (title, body) = alarm_message(instrument_name, change_pct, threshold);
        tracing::warn!(
            instrument = instrument_name,
            change_pct,
            threshold,
            title = %title,
            "{}",
            body
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
    instrument: &'a str,
    change_pct: f64,
    threshold: f64,
}

/// Posts alarms to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        instrument_name: &str,
        change_pct: f64,
        threshold: f64,
    ) -> Result<(), NotifyError> {
        let (title, body) = alarm_message(instrument_name, change_pct, threshold);
        let payload = WebhookPayload {
            title: &title,
            body: &body,
            instrument: instrument_name,
            change_pct,
            threshold,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Delivers to every inner notifier; fails if any of them failed
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(
        &self,
        instrument_name: &str,
        change_pct: f64,
        threshold: f64,
    ) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(instrument_name, change_pct, threshold).await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(failures.join("; ")))
        }
    }
}
