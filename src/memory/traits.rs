// src/memory/traits.rs

//! Capability traits the engine consumes but does not implement. Concrete
//! HTTP adapters live in `providers`; tests supply deterministic doubles.

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::types::Message;

/// text → fixed-dimension vector. Failure is explicit and side-effect free,
/// so every caller may retry.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// ordered messages → summary text. Same failure contract as [`Embedder`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String>;
}
