// src/memory/mod.rs

//! The memory engine proper:
//! - Types: records, messages, stats
//! - Decay: half-life curve and reinforcement
//! - Storage: short-term buffers and the canonical long-term store (SQLite)
//! - Index: derived in-process vector index over record embeddings
//! - Recall: context building for prompt injection
//! - Lifecycle: promotion, decay sweeps, index rebuilds

pub mod admin;
pub mod commands;
pub mod decay;
pub mod index;
pub mod lifecycle;
pub mod long_term;
pub mod recall;
pub mod short_term;
pub mod traits;
pub mod types;
