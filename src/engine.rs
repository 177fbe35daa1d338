// src/engine.rs

//! The explicit context object tying the engine together. The host builds
//! exactly one `MemoryEngine` per configuration snapshot and calls into it —
//! there is no global mutable state.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::memory::decay::DecayPolicy;
use crate::memory::index::VectorIndex;
use crate::memory::lifecycle::MemoryLifecycleManager;
use crate::memory::long_term::LongTermStore;
use crate::memory::recall::{RecallContext, RetrievalEngine};
use crate::memory::short_term::ShortTermStore;
use crate::memory::traits::{Embedder, Summarizer};
use crate::memory::types::Message;

pub struct MemoryEngine {
    config: Arc<MemoryConfig>,
    short_term: Arc<ShortTermStore>,
    long_term: Arc<LongTermStore>,
    index: Arc<VectorIndex>,
    lifecycle: Arc<MemoryLifecycleManager>,
    retrieval: Arc<RetrievalEngine>,
}

impl MemoryEngine {
    /// Builds the engine over an open SQLite pool: runs migrations, restores
    /// the vector index from the canonical store, and starts the lifecycle
    /// worker.
    pub async fn new(
        pool: SqlitePool,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        config: MemoryConfig,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != config.embedding_dim {
            return Err(MemoryError::InvalidInput(format!(
                "embedder dimension {} does not match configured embedding_dim {}",
                embedder.dimension(),
                config.embedding_dim
            )));
        }

        ShortTermStore::migrate(&pool).await?;
        LongTermStore::migrate(&pool).await?;

        let config = Arc::new(config);
        let policy = DecayPolicy::from_config(&config);
        let index = Arc::new(VectorIndex::new(config.embedding_dim));
        let long_term = Arc::new(LongTermStore::new(pool.clone(), index.clone(), policy));

        // The index is a derived cache; reconstruct it from the store so a
        // restart always comes up consistent.
        let snapshot = long_term.all_embeddings().await?;
        let restored = snapshot.len();
        index.rebuild(snapshot)?;
        info!(records = restored, "vector index restored from store");

        let short_term = Arc::new(ShortTermStore::new(
            pool,
            config.max_messages,
            config.summary_threshold,
        ));

        let lifecycle = MemoryLifecycleManager::spawn(
            short_term.clone(),
            long_term.clone(),
            index.clone(),
            embedder.clone(),
            summarizer,
            config.clone(),
        );

        let retrieval = Arc::new(RetrievalEngine::new(
            short_term.clone(),
            long_term.clone(),
            embedder,
            lifecycle.clone(),
            config.clone(),
        ));

        Ok(Self {
            config,
            short_term,
            long_term,
            index,
            lifecycle,
            retrieval,
        })
    }

    /// Ingests one message: short-term append plus, when the threshold is
    /// reached, an asynchronous promotion.
    pub async fn on_message(&self, session_id: &str, message: Message) -> Result<()> {
        self.lifecycle.on_message(session_id, message).await
    }

    /// Builds the context to inject before the next agent response, using
    /// the configured `retrieval_top_k`.
    pub async fn build_context(&self, session_id: &str, query_text: &str) -> Result<RecallContext> {
        self.retrieval
            .build_context(session_id, query_text, self.config.retrieval_top_k)
            .await
    }

    /// Starts the background decay sweeper at the configured interval.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.lifecycle.spawn_sweeper(self.config.sweep_interval())
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn short_term(&self) -> &Arc<ShortTermStore> {
        &self.short_term
    }

    pub fn long_term(&self) -> &Arc<LongTermStore> {
        &self.long_term
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn lifecycle(&self) -> &Arc<MemoryLifecycleManager> {
        &self.lifecycle
    }

    pub fn retrieval(&self) -> &Arc<RetrievalEngine> {
        &self.retrieval
    }
}
