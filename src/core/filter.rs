//! Read-side filtering of the merged intelligence view

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::types::DomainRecord;

/// Minimum urgency of an "essential" record
pub const ESSENTIAL_URGENCY: u8 = 8;

/// Sentiment keywords that mark a record as bearish
pub const BEARISH_KEYWORDS: &[&str] =
    &["鹰", "利空", "下跌", "Bearish", "Hawkish", "Pressure"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    All,
    Essential,
    Bearish,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub query: String,
    pub mode: FilterMode,
}

impl RecordFilter {
    pub fn new(query: impl Into<String>, mode: FilterMode) -> Self {
        Self {
            query: query.into(),
            mode,
        }
    }

    pub fn matches(&self, record: &DomainRecord) -> bool {
        let mode_ok = match self.mode {
            FilterMode::All => true,
            FilterMode::Essential => record.urgency_score >= ESSENTIAL_URGENCY,
            FilterMode::Bearish => is_bearish(&record.sentiment),
        };
        if !mode_ok {
            return false;
        }

        let query = self.query.trim();
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        [&record.summary, &record.content, &record.author]
            .iter()
            .any(|field| field.to_lowercase().contains(&query))
    }

    /// Matching records, order preserved
    pub fn apply(&self, records: &[DomainRecord]) -> Vec<DomainRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Ids already reported from the view, bounded by the view itself
#[derive(Debug, Default)]
pub struct SeenRecords {
    ids: HashSet<i64>,
}

impl SeenRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matching records not returned before; ids evicted from `view` are forgotten
    pub fn fresh(&mut self, filter: &RecordFilter, view: &[DomainRecord]) -> Vec<DomainRecord> {
        let live: HashSet<i64> = view.iter().map(|r| r.id).collect();
        self.ids.retain(|id| live.contains(id));
        filter
            .apply(view)
            .into_iter()
            .filter(|r| self.ids.insert(r.id))
            .collect()
    }
}

pub fn is_bearish(sentiment: &str) -> bool {
    let lowered = sentiment.to_lowercase();
    BEARISH_KEYWORDS
        .iter()
        .any(|k| lowered.contains(&k.to_lowercase()))
}
