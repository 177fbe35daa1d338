// src/memory/recall.rs

//! Context building for prompt injection.
//!
//! Merges top-k long-term semantic hits with the recent short-term window,
//! long-term first, deduplicating by content hash. Every long-term hit that
//! makes it into the context is reinforced. If the query cannot be embedded
//! the context degrades to recency-only instead of failing the caller.

use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::memory::lifecycle::MemoryLifecycleManager;
use crate::memory::long_term::LongTermStore;
use crate::memory::short_term::ShortTermStore;
use crate::memory::traits::Embedder;
use crate::memory::types::{Message, ScoredRecord};

/// The injectable context: semantic long-term hits plus recent dialogue.
#[derive(Debug, Default)]
pub struct RecallContext {
    pub semantic: Vec<ScoredRecord>,
    pub recent: Vec<Message>,
}

impl RecallContext {
    pub fn is_empty(&self) -> bool {
        self.semantic.is_empty() && self.recent.is_empty()
    }

    /// Renders the context as a prompt block the host appends to its system
    /// prompt before the agent responds.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();

        if !self.semantic.is_empty() {
            let mut block = String::from("=== Long-term memory (relevant) ===\n");
            for hit in &self.semantic {
                block.push_str(&format!(
                    "[importance: {:.1}] {}\n",
                    hit.record.importance, hit.record.content
                ));
            }
            parts.push(block);
        }

        if !self.recent.is_empty() {
            let mut block = String::from("=== Short-term memory (recent dialogue) ===\n");
            for message in &self.recent {
                block.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
            }
            parts.push(block);
        }

        parts.join("\n")
    }
}

pub struct RetrievalEngine {
    short_term: Arc<ShortTermStore>,
    long_term: Arc<LongTermStore>,
    embedder: Arc<dyn Embedder>,
    lifecycle: Arc<MemoryLifecycleManager>,
    config: Arc<MemoryConfig>,
}

impl RetrievalEngine {
    pub fn new(
        short_term: Arc<ShortTermStore>,
        long_term: Arc<LongTermStore>,
        embedder: Arc<dyn Embedder>,
        lifecycle: Arc<MemoryLifecycleManager>,
        config: Arc<MemoryConfig>,
    ) -> Self {
        Self {
            short_term,
            long_term,
            embedder,
            lifecycle,
            config,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Builds the context injected before each agent response. Read-only
    /// apart from reinforcing the long-term hits it returns.
    pub async fn build_context(
        &self,
        session_id: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<RecallContext> {
        let recent = self
            .short_term
            .get_recent(session_id, self.config.recent_window)
            .await?;

        let semantic = match self.embedder.embed(query_text).await {
            Ok(query_vector) => {
                let found = self.long_term.search_semantic(&query_vector, top_k).await?;
                if !found.stale_ids.is_empty() {
                    warn!(
                        stale = found.stale_ids.len(),
                        "dropping stale index hits, scheduling rebuild"
                    );
                    self.lifecycle.schedule_rebuild();
                }
                found.hits
            }
            Err(MemoryError::EmbeddingFailed(reason)) => {
                warn!(%reason, "query embedding failed, degrading to recency-only context");
                Vec::new()
            }
            Err(MemoryError::Timeout(elapsed)) => {
                warn!(?elapsed, "query embedding timed out, degrading to recency-only context");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        // Merge long-term first, then recent dialogue, deduplicating by
        // content hash across both tiers.
        let mut seen: HashSet<[u8; 32]> = HashSet::new();
        let mut deduped_semantic = Vec::with_capacity(semantic.len());
        for hit in semantic {
            if seen.insert(content_hash(&hit.record.content)) {
                deduped_semantic.push(hit);
            }
        }
        let deduped_recent: Vec<Message> = recent
            .into_iter()
            .filter(|m| seen.insert(content_hash(&m.content)))
            .collect();

        // Use resets the decay clock on every hit we surface.
        for hit in &deduped_semantic {
            match self.long_term.reinforce(hit.record.id).await {
                Ok(()) => {}
                Err(MemoryError::NotFound(id)) => debug!(id, "hit deleted before reinforcement"),
                Err(e) => return Err(e),
            }
        }

        Ok(RecallContext {
            semantic: deduped_semantic,
            recent: deduped_recent,
        })
    }
}

fn content_hash(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.finalize().into()
}
