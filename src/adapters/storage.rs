//! Durable record stores
//!
//! `JsonFileStore` mirrors intelligence records into a single JSON file.
//! Inserts stay in memory until `flush`, which writes a sibling temp file
//! and renames it over the target so a crash never leaves a torn file.
//!
//! Both stores keep only the most recent `retention` records by
//! (timestamp, id); older ones are evicted on insert and never flushed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::adapters::errors::{StorageError, StorageResult};
use crate::adapters::traits::DurableStore;
use crate::core::types::DomainRecord;

/// Records kept by a store unless configured otherwise
pub const DEFAULT_CACHE_RETENTION: usize = 1000;

type RecordKey = (DateTime<Utc>, i64);

#[derive(Debug)]
struct StoreState {
    ordered: BTreeMap<RecordKey, DomainRecord>,
    index: HashMap<i64, DateTime<Utc>>,
    retention: usize,
    dirty: bool,
}

impl StoreState {
    fn new(retention: usize) -> Self {
        Self {
            ordered: BTreeMap::new(),
            index: HashMap::new(),
            retention: retention.max(1),
            dirty: false,
        }
    }

    fn with_records(retention: usize, records: Vec<DomainRecord>) -> Self {
        let mut state = Self::new(retention);
        for record in records {
            state.insert(record);
        }
        state.dirty = false;
        state
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }

    fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    /// Returns false for known ids and for records older than a full window
    fn insert(&mut self, record: DomainRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        let key = (record.timestamp, record.id);
        if self.ordered.len() >= self.retention {
            if let Some((oldest, _)) = self.ordered.first_key_value() {
                if key < *oldest {
                    return false;
                }
            }
        }

        self.index.insert(record.id, record.timestamp);
        self.ordered.insert(key, record);
        self.evict();
        self.dirty = true;
        true
    }

    fn set_retention(&mut self, retention: usize) {
        self.retention = retention.max(1);
        if self.ordered.len() > self.retention {
            self.evict();
            self.dirty = true;
        }
    }

    fn evict(&mut self) {
        while self.ordered.len() > self.retention {
            if let Some(((_, id), _)) = self.ordered.pop_first() {
                self.index.remove(&id);
            }
        }
    }

    fn recent(&self, limit: usize) -> Vec<DomainRecord> {
        self.ordered.values().rev().take(limit).cloned().collect()
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_RETENTION)
    }
}

/// File-backed store keyed by record id
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store, loading any records already on disk
    ///
    /// A missing file is an empty store; an unreadable one is an error.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<DomainRecord> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let state = StoreState::with_records(DEFAULT_CACHE_RETENTION, records);
        tracing::debug!(path = %path.display(), count = state.len(), "Opened record cache");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Cap the store at `retention` records, evicting the oldest now if needed
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.state.get_mut().set_retention(retention);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn exists(&self, id: i64) -> StorageResult<bool> {
        Ok(self.state.lock().await.contains(id))
    }

    async fn insert(&self, record: &DomainRecord) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if !state.contains(record.id) {
            state.insert(record.clone());
        }
        Ok(())
    }

    async fn flush(&self) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(());
        }

        let list: Vec<&DomainRecord> = state.ordered.values().collect();
        let bytes = serde_json::to_vec_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        state.dirty = false;
        tracing::debug!(path = %self.path.display(), count = state.len(), "Record cache flushed");
        Ok(())
    }

    async fn load_recent(&self, limit: usize) -> StorageResult<Vec<DomainRecord>> {
        Ok(self.state.lock().await.recent(limit))
    }
}

/// Process-local store for runs without a cache file
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            state: Mutex::new(StoreState::new(retention)),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn exists(&self, id: i64) -> StorageResult<bool> {
        Ok(self.state.lock().await.contains(id))
    }

    async fn insert(&self, record: &DomainRecord) -> StorageResult<()> {
        self.state.lock().await.insert(record.clone());
        Ok(())
    }

    async fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn load_recent(&self, limit: usize) -> StorageResult<Vec<DomainRecord>> {
        Ok(self.state.lock().await.recent(limit))
    }
}
