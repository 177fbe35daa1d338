// src/memory/types.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable long-term memory record. Canonical copy lives in SQLite; the
/// vector index only carries the `(id, embedding)` projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Monotonic, never reused, even after delete (SQLite AUTOINCREMENT).
    pub id: i64,
    pub content: String,
    /// Fixed-dimension embedding; dimension matches the active index.
    pub embedding: Vec<f32>,
    /// Current effective importance in [0, 1], after decay.
    pub importance: f32,
    /// Value decay recomputes from; reinforcement restores importance to it.
    pub base_importance: f32,
    pub created_at: DateTime<Utc>,
    pub last_reinforced_at: DateTime<Utc>,
    pub source_session: Option<String>,
}

/// A single turn of dialogue. Immutable once appended; leaves the short-term
/// window only via FIFO eviction or an explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

// Parse roles defensively for DB/text interop.
impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        })
    }
}

/// A long-term hit with its query similarity attached.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub similarity: f32,
}

/// A short-term message with its storage id, for the management surface.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    #[serde(flatten)]
    pub message: Message,
}

/// Which tier a `forget` targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTier {
    Long,
    Short,
}

/// Per-session listing for the management surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOverview {
    pub session_id: String,
    pub message_count: i64,
    pub first_message: Option<DateTime<Utc>>,
    pub last_message: Option<DateTime<Utc>>,
}

/// Aggregate statistics across both tiers.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub long_term_records: i64,
    pub short_term_sessions: i64,
    pub short_term_messages: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Snapshot of engine health for the host's `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub long_term_records: i64,
    pub short_term_sessions: i64,
    pub short_term_messages: i64,
    pub index_entries: usize,
    pub decay_enabled: bool,
    pub config_version: u32,
}
