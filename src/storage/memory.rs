//! Process-local historical store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::RwLock;

use super::{HistoricalStore, StoredPuzzle};
use crate::diversity::Fingerprint;
use crate::error::StoreError;

/// History held in memory; cloned records are returned to callers.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<StoredPuzzle>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing history.
    pub fn with_records(records: Vec<StoredPuzzle>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every record, in insertion order.
    pub fn snapshot(&self) -> Result<Vec<StoredPuzzle>, StoreError> {
        Ok(self
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone())
    }
}

#[async_trait]
impl HistoricalStore for InMemoryStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredPuzzle>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.iter().find(|r| &r.fingerprint == fingerprint).cloned())
    }

    async fn find_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<StoredPuzzle>, StoreError> {
        let cutoff = Utc::now() - window;
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;

        let mut recent: Vec<StoredPuzzle> = records
            .iter()
            .filter(|r| r.created_at >= cutoff)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn insert_on_publish(&self, puzzle: &StoredPuzzle) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        if records.iter().any(|r| r.fingerprint == puzzle.fingerprint) {
            return Err(StoreError::DuplicateFingerprint(puzzle.fingerprint.to_string()));
        }
        records.push(puzzle.clone());
        Ok(())
    }
}
