// src/memory/admin.rs

//! Data access behind the host's management interface. The host implements
//! HTTP and authentication; these handlers implement the reads, updates, and
//! deletes it needs for records and sessions. Aggregate statistics come from
//! [`MemoryEngine::stats`].

use crate::engine::MemoryEngine;
use crate::error::Result;
use crate::memory::types::{MemoryRecord, SessionOverview, StoredMessage};

impl MemoryEngine {
    pub async fn get_record(&self, id: i64) -> Result<MemoryRecord> {
        self.long_term().get(id).await
    }

    /// Edits a record's content and/or base importance. The embedding is not
    /// recomputed; the host re-creates the record if it wants fresh vectors.
    pub async fn update_record(
        &self,
        id: i64,
        content: Option<&str>,
        importance: Option<f32>,
    ) -> Result<MemoryRecord> {
        self.long_term().update(id, content, importance).await
    }

    pub async fn delete_record(&self, id: i64) -> Result<()> {
        self.long_term().delete(id).await
    }

    /// Paged record listing, newest first.
    pub async fn list_records(&self, limit: usize, offset: usize) -> Result<Vec<MemoryRecord>> {
        self.long_term().list(limit, offset).await
    }

    /// All known sessions with message counts and activity timestamps.
    pub async fn list_sessions(&self) -> Result<Vec<SessionOverview>> {
        self.short_term().list_sessions().await
    }

    /// Message dump for one session, oldest first, with storage ids.
    pub async fn session_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.short_term().load_messages(session_id, limit).await
    }

    /// Clears one session's short-term history.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.short_term().reset(session_id).await
    }
}
