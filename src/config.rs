// src/config.rs

//! Immutable configuration snapshot for the memory engine.
//!
//! The host loads and validates configuration, then hands the engine one
//! frozen `MemoryConfig`. Values never change mid-computation; a reload is an
//! explicit version bump that constructs a new engine.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{MemoryError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    // ── Decay
    pub decay_enabled: bool,
    /// Half-life of a record's importance, in days.
    pub decay_days: u32,
    /// Importance at or below this is "forgotten" and lazily pruned.
    pub forget_floor: f32,
    /// Importance assigned to freshly promoted records.
    pub initial_importance: f32,

    // ── Retrieval
    pub retrieval_top_k: usize,
    /// Recent-dialogue window merged into every recall context.
    pub recent_window: usize,

    // ── Short-term buffer
    /// Unpromoted messages needed before a summary window fires.
    pub summary_threshold: usize,
    /// Per-session buffer cap; oldest messages are evicted FIFO beyond this.
    pub max_messages: usize,

    // ── Providers
    /// Embedding dimension; must match the embedder and the vector index.
    pub embedding_dim: usize,
    pub provider_timeout_secs: u64,

    // ── Background tasks
    pub sweep_interval_secs: u64,

    /// Bumped by the host on explicit reload.
    pub version: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            decay_enabled: true,
            decay_days: 30,
            forget_floor: 0.05,
            initial_importance: 1.0,
            retrieval_top_k: 5,
            recent_window: 10,
            summary_threshold: 20,
            max_messages: 50,
            embedding_dim: 1536,
            provider_timeout_secs: 30,
            sweep_interval_secs: 3600,
            version: 1,
        }
    }
}

impl MemoryConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Rejects snapshots the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(MemoryError::InvalidInput("max_messages must be > 0".into()));
        }
        if self.summary_threshold == 0 {
            return Err(MemoryError::InvalidInput(
                "summary_threshold must be > 0".into(),
            ));
        }
        if self.decay_enabled && self.decay_days == 0 {
            return Err(MemoryError::InvalidInput(
                "decay_days must be > 0 when decay is enabled".into(),
            ));
        }
        if self.embedding_dim == 0 {
            return Err(MemoryError::InvalidInput("embedding_dim must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.initial_importance) {
            return Err(MemoryError::InvalidInput(
                "initial_importance must be within [0, 1]".into(),
            ));
        }
        if self.forget_floor < 0.0 {
            return Err(MemoryError::InvalidInput(
                "forget_floor must not be negative".into(),
            ));
        }
        Ok(())
    }
}
