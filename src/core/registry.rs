//! Registry of running valuation actors, one per watched instrument
//!
//! Actors share collaborators (transport, history, notifier) but no mutable
//! state; each runs on its own task.

use std::collections::HashMap;

use futures_util::future::join_all;
use tracing::info;

use crate::core::valuation::{ValuationDeps, ValuationLiveActor, ValuationSettings};
use crate::core::types::Instrument;

pub struct ValuationRegistry {
    settings: ValuationSettings,
    deps: ValuationDeps,
    actors: HashMap<String, ValuationLiveActor>,
}

impl ValuationRegistry {
    pub fn new(settings: ValuationSettings, deps: ValuationDeps) -> Self {
        Self {
            settings,
            deps,
            actors: HashMap::new(),
        }
    }

    /// Start (or restart) the actor for `instrument`
    pub fn watch(&mut self, instrument: Instrument) -> &ValuationLiveActor {
        let settings = &self.settings;
        let deps = &self.deps;
        let actor = self
            .actors
            .entry(instrument.code.clone())
            .or_insert_with(|| ValuationLiveActor::new(instrument, settings.clone(), deps.clone()));
        if actor.start() {
            info!(instrument = %actor.instrument().code, "Watching instrument");
        }
        actor
    }

    /// Stop and drop the actor for `code`
    pub async fn unwatch(&mut self, code: &str) -> bool {
        match self.actors.remove(code) {
            Some(mut actor) => {
                actor.stop().await;
                info!(instrument = code, "Unwatched instrument");
                true
            }
            None => false,
        }
    }

    pub fn get(&self, code: &str) -> Option<&ValuationLiveActor> {
        self.actors.get(code)
    }

    /// Watched codes, sorted
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.actors.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Stop every actor concurrently
    pub async fn shutdown(&mut self) {
        let count = self.actors.len();
        join_all(self.actors.values_mut().map(|actor| actor.stop())).await;
        self.actors.clear();
        info!(count, "Valuation registry shut down");
    }
}
