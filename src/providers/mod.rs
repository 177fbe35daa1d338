// src/providers/mod.rs

//! Concrete provider adapters for the capabilities the engine consumes.
//! OpenAI-compatible HTTP endpoints; the host may substitute any other
//! implementation of the [`Embedder`]/[`Summarizer`] traits.
//!
//! [`Embedder`]: crate::memory::traits::Embedder
//! [`Summarizer`]: crate::memory::traits::Summarizer

pub mod openai;

pub use openai::{OpenAiEmbedder, OpenAiSummarizer, ProviderConfig};
