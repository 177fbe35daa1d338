// src/memory/long_term.rs

//! Canonical durable store of long-term memory records.
//!
//! Owns record persistence, decay, and reinforcement. The vector index is a
//! derived cache: every mutation writes SQLite first and then updates the
//! index, with a full rebuild from the store as the ground-truth recovery
//! path. Embeddings are stored as little-endian f32 BLOBs.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::{Executor, Row, SqlitePool};
use tracing::{debug, warn};

use crate::error::{MemoryError, Result};
use crate::memory::decay::DecayPolicy;
use crate::memory::index::VectorIndex;
use crate::memory::types::{MemoryRecord, ScoredRecord};

const CREATE_MEMORIES: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    importance REAL NOT NULL,
    base_importance REAL NOT NULL,
    created_at DATETIME NOT NULL,
    last_reinforced_at DATETIME NOT NULL,
    source_session TEXT
);
CREATE INDEX IF NOT EXISTS idx_memories_session ON memories(source_session);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
"#;

/// Result of a semantic search: hydrated hits plus any index entries that no
/// longer have a backing record. Stale ids never fail the search; the caller
/// schedules a rebuild instead.
#[derive(Debug, Default)]
pub struct SemanticHits {
    pub hits: Vec<ScoredRecord>,
    pub stale_ids: Vec<i64>,
}

pub struct LongTermStore {
    pool: SqlitePool,
    index: Arc<VectorIndex>,
    policy: DecayPolicy,
}

impl LongTermStore {
    pub fn new(pool: SqlitePool, index: Arc<VectorIndex>, policy: DecayPolicy) -> Self {
        Self { pool, index, policy }
    }

    /// Idempotent schema setup; run at every startup.
    pub async fn migrate(pool: &SqlitePool) -> Result<()> {
        pool.execute(CREATE_MEMORIES).await?;
        Ok(())
    }

    pub fn policy(&self) -> &DecayPolicy {
        &self.policy
    }

    /// Persists a new record with the configured initial importance and
    /// inserts its embedding into the index.
    pub async fn create(
        &self,
        content: &str,
        embedding: Vec<f32>,
        source_session: Option<&str>,
    ) -> Result<MemoryRecord> {
        if embedding.len() != self.index.dimension() {
            return Err(MemoryError::InvalidInput(format!(
                "embedding dimension {} does not match index dimension {}",
                embedding.len(),
                self.index.dimension()
            )));
        }

        let now = Utc::now();
        let importance = self.policy.initial_importance;
        let row = sqlx::query(
            r#"
            INSERT INTO memories (
                content, embedding, importance, base_importance,
                created_at, last_reinforced_at, source_session
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(content)
        .bind(embedding_to_blob(&embedding))
        .bind(importance)
        .bind(importance)
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(source_session)
        .fetch_one(&self.pool)
        .await?;
        let id: i64 = row.get("id");

        self.index.insert(id, embedding.clone())?;
        debug!(id, "created long-term memory record");

        Ok(MemoryRecord {
            id,
            content: content.to_string(),
            embedding,
            importance,
            base_importance: importance,
            created_at: now,
            last_reinforced_at: now,
            source_session: source_session.map(str::to_string),
        })
    }

    pub async fn get(&self, id: i64) -> Result<MemoryRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, content, embedding, importance, base_importance,
                   created_at, last_reinforced_at, source_session
            FROM memories WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).ok_or(MemoryError::NotFound(id))
    }

    /// Idempotent delete: removes record and index entry; a missing id
    /// returns `NotFound` without side effects.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MemoryError::NotFound(id));
        }
        self.index.remove(id);
        Ok(())
    }

    /// Management update: content and/or base importance. The embedding is
    /// left untouched; re-embedding is the host's call.
    pub async fn update(
        &self,
        id: i64,
        content: Option<&str>,
        base_importance: Option<f32>,
    ) -> Result<MemoryRecord> {
        if let Some(importance) = base_importance {
            if !(0.0..=1.0).contains(&importance) {
                return Err(MemoryError::InvalidInput(
                    "importance must be within [0, 1]".into(),
                ));
            }
        }

        let current = self.get(id).await?;
        let new_content = content.unwrap_or(&current.content);
        let new_base = base_importance.unwrap_or(current.base_importance);
        let new_importance = self.policy.decayed_importance(
            new_base,
            current.last_reinforced_at,
            Utc::now(),
        );

        sqlx::query(
            "UPDATE memories SET content = ?, base_importance = ?, importance = ? WHERE id = ?",
        )
        .bind(new_content)
        .bind(new_base)
        .bind(new_importance)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    /// Paged listing, newest first.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MemoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, embedding, importance, base_importance,
                   created_at, last_reinforced_at, source_session
            FROM memories
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM memories")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    pub async fn last_activity(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MAX(created_at) AS latest FROM memories")
            .fetch_one(&self.pool)
            .await?;
        Ok(row
            .get::<Option<NaiveDateTime>, _>("latest")
            .map(|n| Utc.from_utc_datetime(&n)))
    }

    /// Top-k semantic search: delegates to the index, hydrates full records,
    /// and excludes forgotten ones, pruning them lazily. Over-fetches from
    /// the index so pruning does not starve the result set.
    pub async fn search_semantic(&self, query: &[f32], k: usize) -> Result<SemanticHits> {
        let candidates = self.index.search(query, k.saturating_mul(2).max(k))?;
        let now = Utc::now();
        let mut out = SemanticHits::default();

        for (id, similarity) in candidates {
            if out.hits.len() >= k {
                break;
            }
            let record = match self.hydrate_indexed(id).await {
                Ok(record) => record,
                Err(MemoryError::IndexInconsistency(stale)) => {
                    warn!(id = stale, "index entry has no backing record");
                    out.stale_ids.push(stale);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let importance =
                self.policy
                    .decayed_importance(record.base_importance, record.last_reinforced_at, now);
            if self.policy.is_forgotten(importance) {
                debug!(id, importance, "pruning forgotten record during search");
                // Lazy prune; a concurrent delete is fine.
                match self.delete(id).await {
                    Ok(()) | Err(MemoryError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                continue;
            }

            let mut record = record;
            record.importance = importance;
            out.hits.push(ScoredRecord { record, similarity });
        }

        Ok(out)
    }

    /// `get` for ids coming out of the index: a miss means the index has
    /// diverged from the store, not that the caller asked for a bad id.
    async fn hydrate_indexed(&self, id: i64) -> Result<MemoryRecord> {
        match self.get(id).await {
            Err(MemoryError::NotFound(_)) => Err(MemoryError::IndexInconsistency(id)),
            other => other,
        }
    }

    /// Recomputes every record's importance from its base and the time since
    /// last reinforcement. Deterministic and idempotent; a no-op when decay
    /// is disabled. Returns how many rows were updated.
    pub async fn apply_decay(&self, now: DateTime<Utc>) -> Result<u64> {
        if !self.policy.enabled {
            return Ok(0);
        }

        let rows = sqlx::query("SELECT id, base_importance, last_reinforced_at FROM memories")
            .fetch_all(&self.pool)
            .await?;
        let mut updated = 0u64;

        for row in &rows {
            let id: i64 = row.get("id");
            let base: f32 = row.get("base_importance");
            let last: NaiveDateTime = row.get("last_reinforced_at");
            let importance =
                self.policy
                    .decayed_importance(base, Utc.from_utc_datetime(&last), now);

            sqlx::query("UPDATE memories SET importance = ? WHERE id = ?")
                .bind(importance)
                .bind(id)
                .execute(&self.pool)
                .await?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Deletes every record whose decayed importance sits at or below the
    /// forget floor. Idempotent; returns how many were pruned.
    pub async fn prune_forgotten(&self, now: DateTime<Utc>) -> Result<u64> {
        if !self.policy.enabled {
            return Ok(0);
        }

        let rows = sqlx::query("SELECT id, base_importance, last_reinforced_at FROM memories")
            .fetch_all(&self.pool)
            .await?;
        let mut pruned = 0u64;

        for row in &rows {
            let id: i64 = row.get("id");
            let base: f32 = row.get("base_importance");
            let last: NaiveDateTime = row.get("last_reinforced_at");
            let importance =
                self.policy
                    .decayed_importance(base, Utc.from_utc_datetime(&last), now);
            if self.policy.is_forgotten(importance) {
                match self.delete(id).await {
                    Ok(()) | Err(MemoryError::NotFound(_)) => pruned += 1,
                    Err(e) => return Err(e),
                }
            }
        }

        if pruned > 0 {
            debug!(pruned, "pruned forgotten records");
        }
        Ok(pruned)
    }

    /// Resets the decay clock on retrieval/use: `last_reinforced_at` moves to
    /// now and importance returns to its base. Never decreases importance.
    pub async fn reinforce(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE memories SET last_reinforced_at = ?, importance = base_importance WHERE id = ?",
        )
        .bind(now.naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MemoryError::NotFound(id));
        }
        Ok(())
    }

    /// `(id, embedding)` snapshot of the whole store, for index rebuilds.
    pub async fn all_embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let rows = sqlx::query("SELECT id, embedding FROM memories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let blob: Vec<u8> = row.get("embedding");
                (id, blob_to_embedding(&blob))
            })
            .collect())
    }
}

// f32 ↔ BLOB helpers (little-endian, 4 bytes per component).

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("4-byte chunk")))
        .collect()
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> MemoryRecord {
    let created_at: NaiveDateTime = row.get("created_at");
    let last_reinforced_at: NaiveDateTime = row.get("last_reinforced_at");
    let blob: Vec<u8> = row.get("embedding");
    MemoryRecord {
        id: row.get("id"),
        content: row.get("content"),
        embedding: blob_to_embedding(&blob),
        importance: row.get("importance"),
        base_importance: row.get("base_importance"),
        created_at: Utc.from_utc_datetime(&created_at),
        last_reinforced_at: Utc.from_utc_datetime(&last_reinforced_at),
        source_session: row.get("source_session"),
    }
}
