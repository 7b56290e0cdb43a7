//! Bounded, deduplicated, timestamp-ordered record buffer
//!
//! Insert-if-absent by `id` (first seen wins), re-sort the whole buffer by
//! `timestamp` descending after every merge, then truncate to capacity.
//! Equal timestamps are ordered by `id` descending so the order is total and
//! re-delivering an evicted record can never displace a kept one.
//! Not thread-safe on its own; the owning feed serializes access.

use std::collections::HashSet;

use super::types::DomainRecord;

/// Default capacity of the intelligence buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// What a merge changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Records that were new to the buffer, in arrival order
    pub accepted: Vec<DomainRecord>,
    /// Ids dropped by the size cap
    pub evicted: Vec<i64>,
}

impl MergeOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.accepted.is_empty() && self.evicted.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BoundedMergeBuffer {
    capacity: usize,
    records: Vec<DomainRecord>,
    ids: HashSet<i64>,
}

impl BoundedMergeBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    /// Merge a batch and return the new authoritative ordered view
    pub fn merge<I>(&mut self, incoming: I) -> &[DomainRecord]
    where
        I: IntoIterator<Item = DomainRecord>,
    {
        self.merge_detailed(incoming);
        &self.records
    }

    /// Merge a batch and report which records were accepted and evicted
    pub fn merge_detailed<I>(&mut self, incoming: I) -> MergeOutcome
    where
        I: IntoIterator<Item = DomainRecord>,
    {
        let mut accepted = Vec::new();
        for record in incoming {
            if self.ids.insert(record.id) {
                accepted.push(record);
            }
        }

        if accepted.is_empty() {
            return MergeOutcome::default();
        }

        let mut merged = Vec::with_capacity(self.records.len() + accepted.len());
        merged.extend(accepted.iter().cloned());
        merged.append(&mut self.records);
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));

        let mut evicted = Vec::new();
        if merged.len() > self.capacity {
            for record in merged.drain(self.capacity..) {
                self.ids.remove(&record.id);
                evicted.push(record.id);
            }
        }
        self.records = merged;

        if !evicted.is_empty() {
            tracing::debug!(
                evicted = evicted.len(),
                capacity = self.capacity,
                "Buffer cap reached"
            );
        }

        MergeOutcome { accepted, evicted }
    }

    pub fn view(&self) -> &[DomainRecord] {
        &self.records
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BoundedMergeBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
