// src/lib.rs

//! Hybrid memory engine for conversational agents.
//!
//! Two tiers working together:
//!
//! - **Short-term**: bounded, per-session message buffers with FIFO eviction
//!   and a promotion pointer.
//! - **Long-term**: durable, semantically searchable records whose importance
//!   decays over time and is reinforced on recall.
//!
//! Conversation windows are periodically summarized and promoted into the
//! long-term store; before each agent response the retrieval engine merges
//! recent dialogue with the most relevant long-term memories into a single
//! injectable context.
//!
//! The host owns command dispatch, configuration loading, and any web
//! surface. It constructs one [`MemoryEngine`] and calls into it.

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod providers;

pub use config::MemoryConfig;
pub use engine::MemoryEngine;
pub use error::MemoryError;
pub use memory::types::{
    EngineStatus, MemoryRecord, MemoryStats, MemoryTier, Message, Role, ScoredRecord,
    SessionOverview,
};
pub use memory::{
    index::VectorIndex,
    lifecycle::MemoryLifecycleManager,
    long_term::LongTermStore,
    recall::{RecallContext, RetrievalEngine},
    short_term::ShortTermStore,
    traits::{Embedder, Summarizer},
};
