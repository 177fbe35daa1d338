// src/error.rs

//! Typed failures for the memory engine. Nothing in here is allowed to take
//! the process down; callers convert provider and storage faults into these
//! variants at the lifecycle-manager boundary.

use std::time::Duration;

/// Memory operation error types
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("embedding provider failed: {0}")]
    EmbeddingFailed(String),

    #[error("summarization provider failed: {0}")]
    SummarizationFailed(String),

    #[error("index entry {0} has no backing record")]
    IndexInconsistency(i64),

    #[error("no record with id {0}")]
    NotFound(i64),

    #[error("provider call exceeded {0:?}")]
    Timeout(Duration),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MemoryError {
    /// Provider faults are retryable without side effects; the promotion
    /// pointer only advances on confirmed success.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::EmbeddingFailed(_)
                | MemoryError::SummarizationFailed(_)
                | MemoryError::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
