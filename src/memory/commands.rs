// src/memory/commands.rs

//! Command surface exposed to the host. The host owns parsing and dispatch
//! (e.g. a `/memory` command group or an MCP tool set); each handler here is
//! one admin-facing operation on the engine.

use tracing::warn;

use crate::engine::MemoryEngine;
use crate::error::Result;
use crate::memory::types::{EngineStatus, MemoryRecord, MemoryStats, MemoryTier, ScoredRecord};

impl MemoryEngine {
    /// `status` — engine health snapshot.
    pub async fn status(&self) -> Result<EngineStatus> {
        let long_term_records = self.long_term().count().await?;
        let (short_term_sessions, short_term_messages, _) = self.short_term().stats().await?;
        Ok(EngineStatus {
            long_term_records,
            short_term_sessions,
            short_term_messages,
            index_entries: self.index().len(),
            decay_enabled: self.config().decay_enabled,
            config_version: self.config().version,
        })
    }

    /// `search <query> [k]` — embeds the query and searches long-term
    /// memory. Unlike recall, a provider failure here surfaces to the
    /// caller: this is a manual command, not the hot path.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>> {
        let query_vector = self.retrieval_embed(query).await?;
        let found = self.long_term().search_semantic(&query_vector, k).await?;
        if !found.stale_ids.is_empty() {
            warn!(stale = found.stale_ids.len(), "search hit stale index entries");
            self.lifecycle().schedule_rebuild();
        }
        Ok(found.hits)
    }

    /// `forget <id> [long|short]` — deletes one record or one short-term
    /// message. `NotFound` on a missing id, non-fatal, no side effects.
    pub async fn forget(&self, id: i64, tier: MemoryTier) -> Result<()> {
        match tier {
            MemoryTier::Long => self.long_term().delete(id).await,
            MemoryTier::Short => self.short_term().delete_message(id).await,
        }
    }

    /// `rebuild-index` — ground-truth recovery: republishes the index from a
    /// store snapshot.
    pub async fn rebuild_index(&self) -> Result<usize> {
        self.lifecycle().rebuild_index().await
    }

    /// `summarize` — promotes the session's pending window immediately,
    /// surfacing provider failures to the caller.
    pub async fn summarize_now(&self, session_id: &str) -> Result<Option<MemoryRecord>> {
        self.lifecycle().summarize_now(session_id).await
    }

    /// `reset` — clears the session's short-term history and discards any
    /// in-flight promotion for it.
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        self.short_term().reset(session_id).await
    }

    /// `stats` — aggregate counts across both tiers.
    pub async fn stats(&self) -> Result<MemoryStats> {
        let long_term_records = self.long_term().count().await?;
        let (short_term_sessions, short_term_messages, short_activity) =
            self.short_term().stats().await?;
        let long_activity = self.long_term().last_activity().await?;
        let last_activity = match (short_activity, long_activity) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        Ok(MemoryStats {
            long_term_records,
            short_term_sessions,
            short_term_messages,
            last_activity,
        })
    }

    async fn retrieval_embed(&self, query: &str) -> Result<Vec<f32>> {
        self.retrieval().embedder().embed(query).await
    }
}
