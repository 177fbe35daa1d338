// src/memory/index.rs

//! Derived vector index over long-term record embeddings.
//!
//! Not a source of truth: always fully reconstructible from the long-term
//! store, which is the recovery path for any detected divergence. Cosine
//! similarity is the single metric, used for every insert and query.
//!
//! Mutations build a fresh snapshot and publish it atomically, so concurrent
//! searches always read either the fully-old or fully-new index — never a
//! partial one.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{MemoryError, Result};

#[derive(Debug, Default)]
struct IndexSnapshot {
    entries: BTreeMap<i64, Vec<f32>>,
}

pub struct VectorIndex {
    dimension: usize,
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: i64) -> bool {
        self.current().entries.contains_key(&id)
    }

    /// Add or update one entry.
    pub fn insert(&self, id: i64, vector: Vec<f32>) -> Result<()> {
        self.check_dimension(&vector)?;
        let mut guard = self.snapshot.write().expect("index lock poisoned");
        let mut entries = guard.entries.clone();
        entries.insert(id, vector);
        *guard = Arc::new(IndexSnapshot { entries });
        Ok(())
    }

    /// Idempotent removal; unknown ids are a no-op.
    pub fn remove(&self, id: i64) {
        let mut guard = self.snapshot.write().expect("index lock poisoned");
        if !guard.entries.contains_key(&id) {
            return;
        }
        let mut entries = guard.entries.clone();
        entries.remove(&id);
        *guard = Arc::new(IndexSnapshot { entries });
    }

    /// Top-k by non-increasing cosine similarity; equal similarities resolve
    /// by ascending id so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(i64, f32)>> {
        self.check_dimension(query)?;
        let snapshot = self.current();

        let mut scored: Vec<(i64, f32)> = snapshot
            .entries
            .iter()
            .map(|(&id, vector)| (id, cosine_similarity(query, vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Deterministic full reconstruction from a store snapshot, published in
    /// a single swap.
    pub fn rebuild<I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = (i64, Vec<f32>)>,
    {
        let mut entries = BTreeMap::new();
        for (id, vector) in records {
            self.check_dimension(&vector)?;
            entries.insert(id, vector);
        }
        let mut guard = self.snapshot.write().expect("index lock poisoned");
        *guard = Arc::new(IndexSnapshot { entries });
        Ok(())
    }

    /// Ids currently indexed, ascending.
    pub fn ids(&self) -> Vec<i64> {
        self.current().entries.keys().copied().collect()
    }

    fn current(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().expect("index lock poisoned").clone()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MemoryError::InvalidInput(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
