//! Historical puzzle storage.
//!
//! The pipeline reads recent history for uniqueness and diversity checks and
//! writes only when a puzzle is published. Two implementations are provided:
//! - **InMemoryStore**: process-local, used by tests and dry runs
//! - **SqliteStore**: durable SQLite file in WAL mode
//!
//! # Usage
//!
//! ```rust,ignore
//! use puzzle_forge::storage::{HistoricalStore, SqliteStore};
//!
//! let store = SqliteStore::open("puzzles.db").await?;
//! let recent = store.find_recent(chrono::Duration::days(30), 100).await?;
//! ```

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::categories::PuzzleCategory;
use crate::diversity::{extract_components, Fingerprint, PatternType, PuzzleSignature};
use crate::error::StoreError;

/// A published puzzle as kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPuzzle {
    pub id: Uuid,
    pub fingerprint: Fingerprint,
    pub content: String,
    pub answer: String,
    pub category: PuzzleCategory,
    pub pattern: PatternType,
    pub explanation: String,
    /// Calibrated difficulty, 1-10.
    pub difficulty: u8,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

impl StoredPuzzle {
    /// Signature used for similarity against candidates.
    pub fn signature(&self) -> PuzzleSignature {
        PuzzleSignature::new(&self.answer, &self.content)
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        extract_components(&self.content).symbols
    }
}

/// Read-mostly history of published puzzles.
#[async_trait]
pub trait HistoricalStore: Send + Sync {
    /// Looks up a puzzle by exact fingerprint.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredPuzzle>, StoreError>;

    /// Puzzles created within `window` of now, newest first, at most `limit`.
    async fn find_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<StoredPuzzle>, StoreError>;

    /// Stores a published puzzle. Fails with `DuplicateFingerprint` if the
    /// fingerprint is already present.
    async fn insert_on_publish(&self, puzzle: &StoredPuzzle) -> Result<(), StoreError>;

    /// Releases underlying resources.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
