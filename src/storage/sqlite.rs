//! SQLite-backed historical store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use super::{HistoricalStore, StoredPuzzle};
use crate::categories::PuzzleCategory;
use crate::diversity::{Fingerprint, PatternType};
use crate::error::StoreError;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS puzzles (
    id              TEXT    PRIMARY KEY,
    fingerprint     TEXT    NOT NULL UNIQUE,
    content         TEXT    NOT NULL,
    answer          TEXT    NOT NULL,
    category        TEXT    NOT NULL,
    pattern         TEXT    NOT NULL,
    explanation     TEXT    NOT NULL DEFAULT '',
    difficulty      INTEGER NOT NULL,
    quality_score   REAL    NOT NULL,

    -- Epoch milliseconds, UTC
    created_at_ms   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_puzzles_created ON puzzles(created_at_ms DESC);
CREATE INDEX IF NOT EXISTS idx_puzzles_category ON puzzles(category);
"#;

const SELECT_COLUMNS: &str = "id, fingerprint, content, answer, category, pattern, explanation, \
                              difficulty, quality_score, created_at_ms";

/// Durable history in a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path = %path.display(), "Puzzle history opened");
        Ok(Self { pool })
    }

    /// Number of stored puzzles.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM puzzles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?.max(0) as u64)
    }
}

fn decode_row(row: &SqliteRow) -> Result<StoredPuzzle, StoreError> {
    let id: String = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::CorruptRecord {
        id: id.clone(),
        reason,
    };

    let uuid = Uuid::parse_str(&id).map_err(|e| corrupt(format!("bad id: {}", e)))?;
    let category = row
        .try_get::<String, _>("category")?
        .parse::<PuzzleCategory>()
        .map_err(corrupt)?;
    let pattern = row
        .try_get::<String, _>("pattern")?
        .parse::<PatternType>()
        .map_err(corrupt)?;
    let created_ms: i64 = row.try_get("created_at_ms")?;
    let created_at: DateTime<Utc> = Utc
        .timestamp_millis_opt(created_ms)
        .single()
        .ok_or_else(|| corrupt(format!("bad timestamp {}", created_ms)))?;
    let difficulty: i64 = row.try_get("difficulty")?;

    Ok(StoredPuzzle {
        id: uuid,
        fingerprint: Fingerprint::from_hex(row.try_get::<String, _>("fingerprint")?),
        content: row.try_get("content")?,
        answer: row.try_get("answer")?,
        category,
        pattern,
        explanation: row.try_get("explanation")?,
        difficulty: difficulty.clamp(1, 10) as u8,
        quality_score: row.try_get("quality_score")?,
        created_at,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

#[async_trait]
impl HistoricalStore for SqliteStore {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StoredPuzzle>, StoreError> {
        let sql = format!("SELECT {} FROM puzzles WHERE fingerprint = ?1", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn find_recent(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<StoredPuzzle>, StoreError> {
        let cutoff_ms = (Utc::now() - window).timestamp_millis();
        let sql = format!(
            "SELECT {} FROM puzzles WHERE created_at_ms >= ?1 ORDER BY created_at_ms DESC LIMIT ?2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff_ms)
            .bind(limit.min(i64::MAX as usize) as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn insert_on_publish(&self, puzzle: &StoredPuzzle) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO puzzles
               (id, fingerprint, content, answer, category, pattern, explanation,
                difficulty, quality_score, created_at_ms)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
        )
        .bind(puzzle.id.to_string())
        .bind(puzzle.fingerprint.as_str())
        .bind(puzzle.content.as_str())
        .bind(puzzle.answer.as_str())
        .bind(puzzle.category.slug())
        .bind(puzzle.pattern.slug())
        .bind(puzzle.explanation.as_str())
        .bind(i64::from(puzzle.difficulty))
        .bind(puzzle.quality_score)
        .bind(puzzle.created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateFingerprint(
                puzzle.fingerprint.to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.pool.close().await;
        tracing::debug!("Puzzle history closed");
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}
