// src/memory/lifecycle.rs

//! Orchestrates promotion, decay sweeps, and index rebuilds — the only
//! mutator of shared state besides the stores' own APIs.
//!
//! Background work flows through a bounded queue consumed by a single worker
//! task, so backpressure is visible (a full queue drops the request and the
//! window simply stays pending until the next trigger) and the message-append
//! and retrieval hot paths never block on provider calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::memory::index::VectorIndex;
use crate::memory::long_term::LongTermStore;
use crate::memory::short_term::{PromotionWindow, ShortTermStore};
use crate::memory::traits::{Embedder, Summarizer};
use crate::memory::types::{MemoryRecord, Message};

const QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
enum LifecycleRequest {
    Promote { session_id: String },
    Sweep,
    RebuildIndex,
}

/// Outcome of one decay sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    pub decayed: u64,
    pub pruned: u64,
}

pub struct MemoryLifecycleManager {
    short_term: Arc<ShortTermStore>,
    long_term: Arc<LongTermStore>,
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    summarizer: Arc<dyn Summarizer>,
    config: Arc<MemoryConfig>,
    queue: mpsc::Sender<LifecycleRequest>,
}

impl MemoryLifecycleManager {
    /// Wires the manager and spawns its worker task.
    pub fn spawn(
        short_term: Arc<ShortTermStore>,
        long_term: Arc<LongTermStore>,
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        config: Arc<MemoryConfig>,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let manager = Arc::new(Self {
            short_term,
            long_term,
            index,
            embedder,
            summarizer,
            config,
            queue: tx,
        });

        // The worker holds only a weak handle: when the engine is dropped the
        // sender goes with it, `recv` sees the closed channel, and the task
        // exits instead of pinning the stores alive.
        let worker = Arc::downgrade(&manager);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let Some(manager) = worker.upgrade() else { break };
                if let Err(err) = manager.handle(request).await {
                    // No failure in here may terminate the process; failed
                    // promotions stay pending and are retried later.
                    warn!(error = %err, "background lifecycle request failed");
                }
            }
        });

        manager
    }

    /// The message ingestion path: appends to short-term memory and, once
    /// the promotion threshold is reached, enqueues an asynchronous
    /// promotion. Never blocks on providers.
    pub async fn on_message(&self, session_id: &str, message: Message) -> Result<()> {
        let threshold_reached = self.short_term.append(session_id, message).await?;
        if threshold_reached {
            let request = LifecycleRequest::Promote {
                session_id: session_id.to_string(),
            };
            if self.queue.try_send(request).is_err() {
                // Queue full: the window stays pending and the next append
                // re-triggers it.
                warn!(session_id, "promotion queue full, deferring window");
            }
        }
        Ok(())
    }

    /// Runs a promotion for the session immediately and surfaces failures to
    /// the caller, unlike the background path. Promotes any non-empty
    /// pending window even below the threshold. Returns the new record, or
    /// `None` if there was nothing to promote.
    pub async fn summarize_now(&self, session_id: &str) -> Result<Option<MemoryRecord>> {
        self.promote(session_id, true).await
    }

    /// One decay pass: recompute every record's importance, then prune
    /// records that have decayed to the forget floor. Idempotent, and reads
    /// stay un-blocked throughout.
    pub async fn periodic_sweep(&self) -> Result<SweepOutcome> {
        let now = chrono::Utc::now();
        let decayed = self.long_term.apply_decay(now).await?;
        let pruned = self.long_term.prune_forgotten(now).await?;
        info!(decayed, pruned, "decay sweep complete");
        Ok(SweepOutcome { decayed, pruned })
    }

    /// Snapshots the store and atomically republishes the index from it —
    /// the recovery path for any detected store/index divergence. Returns
    /// the number of indexed records.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let snapshot = self.long_term.all_embeddings().await?;
        let entries = snapshot.len();
        self.index.rebuild(snapshot)?;
        info!(entries, "vector index rebuilt from store");
        Ok(entries)
    }

    /// Queues a rebuild without blocking; duplicates coalesce into harmless
    /// repeated rebuilds.
    pub fn schedule_rebuild(&self) {
        if self.queue.try_send(LifecycleRequest::RebuildIndex).is_err() {
            warn!("lifecycle queue full, rebuild request dropped");
        }
    }

    /// Queues a decay sweep without blocking.
    pub fn schedule_sweep(&self) {
        if self.queue.try_send(LifecycleRequest::Sweep).is_err() {
            warn!("lifecycle queue full, sweep request dropped");
        }
    }

    /// Spawns the interval-driven sweep loop. Exits once the engine is gone.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(manager) = manager.upgrade() else { break };
                if let Err(err) = manager.periodic_sweep().await {
                    warn!(error = %err, "decay sweep failed");
                }
            }
        })
    }

    async fn handle(&self, request: LifecycleRequest) -> Result<()> {
        match request {
            LifecycleRequest::Promote { session_id } => {
                match self.promote(&session_id, false).await {
                    Ok(_) => Ok(()),
                    // Provider faults leave the window pending for retry.
                    Err(e) if e.is_retryable() => {
                        debug!(session_id, error = %e, "promotion will be retried");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            LifecycleRequest::Sweep => self.periodic_sweep().await.map(|_| ()),
            LifecycleRequest::RebuildIndex => self.rebuild_index().await.map(|_| ()),
        }
    }

    /// Runs one promotion attempt: claim the window, distill it, persist the
    /// record, then advance the pointer — only on full success, and only if
    /// the session generation still matches (a reset mid-flight discards the
    /// result). Exactly-once per window.
    async fn promote(&self, session_id: &str, force: bool) -> Result<Option<MemoryRecord>> {
        let Some(window) = self.short_term.begin_promotion(session_id, force).await? else {
            return Ok(None);
        };
        debug!(
            session_id,
            messages = window.messages.len(),
            "promoting short-term window"
        );

        match self.distill(session_id, &window).await {
            Ok(record) => {
                let committed = self
                    .short_term
                    .complete_promotion(session_id, &window, true)
                    .await?;
                if committed {
                    info!(session_id, record_id = record.id, "window promoted");
                    Ok(Some(record))
                } else {
                    // Session was reset while we were in flight; the record
                    // must not outlive the history it came from.
                    info!(session_id, record_id = record.id, "discarding stale promotion");
                    match self.long_term.delete(record.id).await {
                        Ok(()) | Err(MemoryError::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                    Ok(None)
                }
            }
            Err(e) => {
                self.short_term
                    .complete_promotion(session_id, &window, false)
                    .await?;
                Err(e)
            }
        }
    }

    /// Summarizer → Embedder → LongTermStore.create. Fails without side
    /// effects if either provider does.
    async fn distill(&self, session_id: &str, window: &PromotionWindow) -> Result<MemoryRecord> {
        let summary = self.summarizer.summarize(&window.messages).await?;
        let embedding = self.embedder.embed(&summary).await?;
        self.long_term
            .create(&summary, embedding, Some(session_id))
            .await
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}
