//! At-most-once-per-window alarm debouncer
//!
//! `Idle -> Fired` when `|value| >= threshold`, the alarm is armed and it
//! has not fired in the current window. `Fired -> Idle` only on reset: an
//! explicit `reset()`, a new activation, or (with `ResetPolicy::Daily`) a
//! change of local calendar date. No I/O happens here.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// When the fired flag clears on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// New local calendar day, or new activation
    #[default]
    Daily,
    /// New activation only
    PerActivation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Fired,
}

/// Snapshot of the debouncer for observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmState {
    pub armed: bool,
    pub fired_today: bool,
}

#[derive(Debug, Clone)]
pub struct AlarmDebouncer {
    armed: bool,
    policy: ResetPolicy,
    state: DebounceState,
    window_day: Option<NaiveDate>,
}

impl AlarmDebouncer {
    pub fn new(armed: bool, policy: ResetPolicy) -> Self {
        Self {
            armed,
            policy,
            state: DebounceState::Idle,
            window_day: None,
        }
    }

    /// Evaluate against today's local date
    pub fn evaluate(&mut self, current_value: f64, threshold: f64) -> bool {
        self.evaluate_on(Local::now().date_naive(), current_value, threshold)
    }

    /// Evaluate as if the current local date were `today`
    pub fn evaluate_on(&mut self, today: NaiveDate, current_value: f64, threshold: f64) -> bool {
        if self.policy == ResetPolicy::Daily {
            if let Some(day) = self.window_day {
                if day != today && self.state == DebounceState::Fired {
                    tracing::debug!(%day, %today, "Alarm window rolled over");
                    self.state = DebounceState::Idle;
                }
            }
            self.window_day = Some(today);
        }

        if !self.armed || self.state == DebounceState::Fired {
            return false;
        }
        if !current_value.is_finite() || !threshold.is_finite() {
            return false;
        }

        if current_value.abs() >= threshold {
            self.state = DebounceState::Fired;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.state = DebounceState::Idle;
        self.window_day = None;
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.state
    }

    pub fn state(&self) -> AlarmState {
        AlarmState {
            armed: self.armed,
            fired_today: self.state == DebounceState::Fired,
        }
    }
}

impl Default for AlarmDebouncer {
    fn default() -> Self {
        Self::new(true, ResetPolicy::default())
    }
}
