use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::embed_chunks::Embedder;
use crate::error::{RagError, Result};

/// Where a chunk came from, stored next to its vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_id: String,
    pub source_kind: String,
    pub sequence_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Backing store for embedded chunks, partitioned by agent.
///
/// Implementations must apply the agent partition as a hard filter on every
/// read and delete.
pub trait VectorStore: Send + Sync {
    /// Insert or replace entries by id. Last write wins.
    fn upsert(&self, agent_id: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Drop the agent's entries for `source_id` whose sequence index is
    /// `keep` or higher. `keep == 0` drops the whole source.
    fn prune_source(&self, agent_id: &str, source_id: &str, keep: usize) -> Result<()>;

    /// Texts of the `top_k` entries nearest to `vector`, most similar first.
    /// An agent with no collection yet yields an empty list.
    fn search(&self, agent_id: &str, vector: &[f32], top_k: usize) -> Result<Vec<String>>;
}

/// Tenant-scoped nearest-neighbour search over text.
///
/// Pairs a [`VectorStore`] with the [`Embedder`] that produced its vectors so
/// queries are always embedded by the same model.
#[derive(Clone)]
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn upsert(&self, agent_id: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.store.upsert(agent_id, entries)
    }

    pub fn remove_source(&self, agent_id: &str, source_id: &str) -> Result<()> {
        self.store.prune_source(agent_id, source_id, 0)
    }

    /// Drops the chunks a shorter re-ingest no longer overwrites.
    pub fn prune_source(&self, agent_id: &str, source_id: &str, keep: usize) -> Result<()> {
        self.store.prune_source(agent_id, source_id, keep)
    }

    pub fn query(&self, agent_id: &str, query_text: &str, top_k: usize) -> Result<Vec<String>> {
        if top_k == 0 || query_text.trim().is_empty() {
            return Ok(vec![]);
        }
        let vector = self.embedder.embed_query(query_text)?;
        let hits = self.store.search(agent_id, &vector, top_k)?;
        tracing::debug!(agent_id, hits = hits.len(), top_k, "vector index query");
        Ok(hits)
    }
}

struct StoredEntry {
    id: String,
    text: String,
    vector: Vec<f32>,
    source_id: String,
    sequence_index: usize,
}

/// Process-local store ranking by cosine similarity.
///
/// Ties keep first-insertion order; replacing an id keeps its original slot.
#[derive(Default)]
pub struct MemoryVectorStore {
    agents: RwLock<HashMap<String, Vec<StoredEntry>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, agent_id: &str) -> usize {
        self.agents.read().get(agent_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, agent_id: &str) -> bool {
        self.len(agent_id) == 0
    }
}

impl VectorStore for MemoryVectorStore {
    fn upsert(&self, agent_id: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut agents = self.agents.write();
        let slot = agents.entry(agent_id.to_string()).or_default();

        let dim = slot
            .first()
            .map(|e| e.vector.len())
            .or_else(|| entries.first().map(|e| e.vector.len()))
            .unwrap_or(0);
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dim) {
            return Err(RagError::DimensionMismatch {
                expected: dim,
                actual: bad.vector.len(),
            });
        }

        for entry in entries {
            let stored = StoredEntry {
                id: entry.id.clone(),
                text: entry.text.clone(),
                vector: entry.vector.clone(),
                source_id: entry.metadata.source_id.clone(),
                sequence_index: entry.metadata.sequence_index,
            };
            match slot.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = stored,
                None => slot.push(stored),
            }
        }
        Ok(())
    }

    fn prune_source(&self, agent_id: &str, source_id: &str, keep: usize) -> Result<()> {
        if let Some(slot) = self.agents.write().get_mut(agent_id) {
            slot.retain(|e| e.source_id != source_id || e.sequence_index < keep);
        }
        Ok(())
    }

    fn search(&self, agent_id: &str, vector: &[f32], top_k: usize) -> Result<Vec<String>> {
        let agents = self.agents.read();
        let Some(slot) = agents.get(agent_id) else {
            return Ok(vec![]);
        };
        if let Some(first) = slot.first() {
            if first.vector.len() != vector.len() {
                return Err(RagError::DimensionMismatch {
                    expected: first.vector.len(),
                    actual: vector.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &StoredEntry)> = slot
            .iter()
            .map(|e| (cosine_similarity(&e.vector, vector), e))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, e)| e.text.clone())
            .collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
