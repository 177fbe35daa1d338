// src/memory/short_term.rs

//! Bounded, per-session short-term memory.
//!
//! Each session is a FIFO ring of at most `max_messages` messages plus a
//! promotion pointer marking how much of the buffer has already been
//! distilled into long-term memory. Messages are persisted to SQLite so
//! sessions survive restart; the in-memory state is hydrated lazily on first
//! access, the same way the original session cache sits over its table.
//!
//! Per-session mutation is serialized by a per-session async mutex; sessions
//! are fully independent of each other. Promotion reads but never deletes
//! promoted messages — they leave the window only via FIFO eviction or an
//! explicit reset.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::{Executor, Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::memory::types::{Message, Role, SessionOverview, StoredMessage};

const CREATE_SHORT_TERM: &str = r#"
CREATE TABLE IF NOT EXISTS short_term_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp DATETIME NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_short_term_session ON short_term_messages(session_id);

CREATE TABLE IF NOT EXISTS session_state (
    session_id TEXT PRIMARY KEY,
    last_promoted_index INTEGER NOT NULL DEFAULT 0,
    generation INTEGER NOT NULL DEFAULT 0
);
"#;

/// One buffered message with its in-process sequence number and storage id.
#[derive(Debug, Clone)]
struct BufferedMessage {
    seq: u64,
    row_id: i64,
    message: Message,
}

/// Promotion state machine: PENDING (below threshold) → READY → PROMOTING →
/// PENDING on success, READY again on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionPhase {
    Pending,
    Ready,
    Promoting,
}

#[derive(Debug, Default)]
struct SessionState {
    buffer: VecDeque<BufferedMessage>,
    next_seq: u64,
    /// Count of leading buffer messages already promoted.
    last_promoted_index: usize,
    /// Bumped on reset; stale promotion completions are rejected against it.
    generation: u64,
    promoting: bool,
}

impl SessionState {
    fn pending(&self) -> usize {
        self.buffer.len() - self.last_promoted_index
    }
}

/// Snapshot of the unpromoted window handed to a promotion attempt. The
/// pointer only advances when the attempt completes with a matching
/// generation, which makes promotion exactly-once per window.
#[derive(Debug, Clone)]
pub struct PromotionWindow {
    pub generation: u64,
    pub end_seq: u64,
    pub messages: Vec<Message>,
}

pub struct ShortTermStore {
    pool: SqlitePool,
    max_messages: usize,
    summary_threshold: usize,
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl ShortTermStore {
    pub fn new(pool: SqlitePool, max_messages: usize, summary_threshold: usize) -> Self {
        Self {
            pool,
            max_messages,
            summary_threshold,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Idempotent schema setup; run at every startup.
    pub async fn migrate(pool: &SqlitePool) -> Result<()> {
        pool.execute(CREATE_SHORT_TERM).await?;
        Ok(())
    }

    /// Appends at the tail, evicting FIFO beyond the cap. Returns whether the
    /// unpromoted window has reached the summary threshold.
    pub async fn append(&self, session_id: &str, message: Message) -> Result<bool> {
        let handle = self.session_handle(session_id).await?;
        let mut state = handle.lock().await;

        let row = sqlx::query(
            r#"
            INSERT INTO short_term_messages (session_id, role, content, timestamp)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.timestamp.naive_utc())
        .fetch_one(&self.pool)
        .await?;
        let row_id: i64 = row.get("id");

        let seq = state.next_seq;
        state.next_seq += 1;
        state.buffer.push_back(BufferedMessage {
            seq,
            row_id,
            message,
        });

        if state.buffer.len() > self.max_messages {
            if let Some(evicted) = state.buffer.pop_front() {
                sqlx::query("DELETE FROM short_term_messages WHERE id = ?")
                    .bind(evicted.row_id)
                    .execute(&self.pool)
                    .await?;
                // Pointer tracks a buffer prefix; it shifts with the window.
                if state.last_promoted_index > 0 {
                    state.last_promoted_index -= 1;
                }
                debug!(session_id, seq = evicted.seq, "evicted oldest short-term message");
            }
        }

        self.persist_state(session_id, &state).await?;
        Ok(state.pending() >= self.summary_threshold)
    }

    /// Last `n` messages, oldest → newest.
    pub async fn get_recent(&self, session_id: &str, n: usize) -> Result<Vec<Message>> {
        let handle = self.session_handle(session_id).await?;
        let state = handle.lock().await;
        let skip = state.buffer.len().saturating_sub(n);
        Ok(state
            .buffer
            .iter()
            .skip(skip)
            .map(|m| m.message.clone())
            .collect())
    }

    /// Clears history and pointer, and discards any in-flight promotion for
    /// this session by bumping the generation tag.
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        let handle = self.session_handle(session_id).await?;
        let mut state = handle.lock().await;

        sqlx::query("DELETE FROM short_term_messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        state.buffer.clear();
        state.last_promoted_index = 0;
        state.generation += 1;
        state.promoting = false;
        self.persist_state(session_id, &state).await?;
        debug!(session_id, generation = state.generation, "session reset");
        Ok(())
    }

    pub async fn message_count(&self, session_id: &str) -> Result<usize> {
        let handle = self.session_handle(session_id).await?;
        let state = handle.lock().await;
        Ok(state.buffer.len())
    }

    pub async fn last_promoted_index(&self, session_id: &str) -> Result<usize> {
        let handle = self.session_handle(session_id).await?;
        let state = handle.lock().await;
        Ok(state.last_promoted_index)
    }

    pub async fn promotion_phase(&self, session_id: &str) -> Result<PromotionPhase> {
        let handle = self.session_handle(session_id).await?;
        let state = handle.lock().await;
        Ok(if state.promoting {
            PromotionPhase::Promoting
        } else if state.pending() >= self.summary_threshold {
            PromotionPhase::Ready
        } else {
            PromotionPhase::Pending
        })
    }

    /// Claims the unpromoted window for a promotion attempt. Returns `None`
    /// when a promotion is already in flight, the window is empty, or (unless
    /// forced) still below the threshold. The window is a read-only snapshot;
    /// appends continue unhindered while it is processed.
    pub async fn begin_promotion(
        &self,
        session_id: &str,
        force: bool,
    ) -> Result<Option<PromotionWindow>> {
        let handle = self.session_handle(session_id).await?;
        let mut state = handle.lock().await;

        if state.promoting {
            return Ok(None);
        }
        let pending = state.pending();
        if pending == 0 || (!force && pending < self.summary_threshold) {
            return Ok(None);
        }

        state.promoting = true;
        let messages = state
            .buffer
            .iter()
            .skip(state.last_promoted_index)
            .map(|m| m.message.clone())
            .collect();
        let end_seq = state.buffer.back().map(|m| m.seq).unwrap_or(0);
        Ok(Some(PromotionWindow {
            generation: state.generation,
            end_seq,
            messages,
        }))
    }

    /// Finishes a promotion attempt. The pointer advances only on success
    /// with a matching generation; a failed attempt leaves the same window
    /// pending for retry. Returns whether the attempt was committed.
    pub async fn complete_promotion(
        &self,
        session_id: &str,
        window: &PromotionWindow,
        success: bool,
    ) -> Result<bool> {
        let handle = self.session_handle(session_id).await?;
        let mut state = handle.lock().await;
        state.promoting = false;

        if window.generation != state.generation {
            debug!(session_id, "discarding stale promotion completion");
            return Ok(false);
        }
        if !success {
            return Ok(false);
        }

        // Everything at or below the snapshot's end sequence is now promoted.
        // Counting against the live buffer keeps this correct even if FIFO
        // eviction ran while the promotion was in flight.
        state.last_promoted_index = state
            .buffer
            .iter()
            .take_while(|m| m.seq <= window.end_seq)
            .count();
        self.persist_state(session_id, &state).await?;
        Ok(true)
    }

    /// Deletes a single message by storage id (the short tier of `forget`).
    pub async fn delete_message(&self, row_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM short_term_messages WHERE id = ?")
            .bind(row_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MemoryError::NotFound(row_id));
        }

        // Drop it from any hydrated buffer as well.
        let handles: Vec<(String, Arc<Mutex<SessionState>>)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .map(|(id, h)| (id.clone(), h.clone()))
                .collect()
        };
        for (session_id, handle) in handles {
            let mut state = handle.lock().await;
            if let Some(pos) = state.buffer.iter().position(|m| m.row_id == row_id) {
                state.buffer.remove(pos);
                if pos < state.last_promoted_index {
                    state.last_promoted_index -= 1;
                }
                self.persist_state(&session_id, &state).await?;
                break;
            }
        }
        Ok(())
    }

    /// Full message dump for one session, oldest → newest, with storage ids.
    pub async fn load_messages(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, role, content, timestamp
            FROM short_term_messages
            WHERE session_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<StoredMessage> = rows.into_iter().map(row_to_stored).collect();
        messages.reverse();
        Ok(messages)
    }

    /// Session listing with counts and first/last activity timestamps.
    pub async fn list_sessions(&self) -> Result<Vec<SessionOverview>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, COUNT(*) AS msg_count,
                   MIN(timestamp) AS first_msg, MAX(timestamp) AS last_msg
            FROM short_term_messages
            GROUP BY session_id
            ORDER BY last_msg DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SessionOverview {
                session_id: row.get("session_id"),
                message_count: row.get("msg_count"),
                first_message: row
                    .get::<Option<NaiveDateTime>, _>("first_msg")
                    .map(|n| Utc.from_utc_datetime(&n)),
                last_message: row
                    .get::<Option<NaiveDateTime>, _>("last_msg")
                    .map(|n| Utc.from_utc_datetime(&n)),
            })
            .collect())
    }

    /// (session count, message count, latest activity) across all sessions.
    pub async fn stats(&self) -> Result<(i64, i64, Option<DateTime<Utc>>)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(DISTINCT session_id) AS sessions,
                   COUNT(*) AS messages,
                   MAX(timestamp) AS last_activity
            FROM short_term_messages
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((
            row.get("sessions"),
            row.get("messages"),
            row.get::<Option<NaiveDateTime>, _>("last_activity")
                .map(|n| Utc.from_utc_datetime(&n)),
        ))
    }

    /// Returns the cached session handle, hydrating buffer and pointer from
    /// SQLite on first access. Hydration runs without the session-map lock
    /// held, so one session's first touch never stalls the others.
    async fn session_handle(&self, session_id: &str) -> Result<Arc<Mutex<SessionState>>> {
        {
            let sessions = self.sessions.lock().await;
            if let Some(handle) = sessions.get(session_id) {
                return Ok(handle.clone());
            }
        }

        let stored = self.load_messages(session_id, self.max_messages).await?;
        // Rows beyond the cap can survive an eviction interrupted by a crash;
        // drop them here so the table stays bounded.
        if let Some(oldest) = stored.first() {
            sqlx::query("DELETE FROM short_term_messages WHERE session_id = ? AND id < ?")
                .bind(session_id)
                .bind(oldest.id)
                .execute(&self.pool)
                .await?;
        }
        let pointer_row = sqlx::query(
            "SELECT last_promoted_index, generation FROM session_state WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let mut state = SessionState::default();
        for stored_message in stored {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.buffer.push_back(BufferedMessage {
                seq,
                row_id: stored_message.id,
                message: stored_message.message,
            });
        }
        if let Some(row) = pointer_row {
            let pointer: i64 = row.get("last_promoted_index");
            let generation: i64 = row.get("generation");
            state.last_promoted_index = (pointer.max(0) as usize).min(state.buffer.len());
            state.generation = generation.max(0) as u64;
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(session_id) {
            // Lost the hydration race; the first insert wins.
            return Ok(handle.clone());
        }
        let handle = Arc::new(Mutex::new(state));
        sessions.insert(session_id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn persist_state(&self, session_id: &str, state: &SessionState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_state (session_id, last_promoted_index, generation)
            VALUES (?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                last_promoted_index = excluded.last_promoted_index,
                generation = excluded.generation
            "#,
        )
        .bind(session_id)
        .bind(state.last_promoted_index as i64)
        .bind(state.generation as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_stored(row: sqlx::sqlite::SqliteRow) -> StoredMessage {
    let role: String = row.get("role");
    let timestamp: NaiveDateTime = row.get("timestamp");
    StoredMessage {
        id: row.get("id"),
        message: Message {
            role: role.parse().unwrap_or(Role::User),
            content: row.get("content"),
            timestamp: Utc.from_utc_datetime(&timestamp),
        },
    }
}
