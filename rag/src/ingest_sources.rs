use std::path::PathBuf;

use crate::chunk_text::Chunker;
use crate::error::{RagError, Result};
use crate::extract_text::extract_document;
use crate::sources::{QnaGroup, Source, SourceBody, TextBlock, WebsiteEntry};
use crate::stores::SourceStore;
use crate::vector_index::{ChunkMetadata, IndexEntry, VectorIndex};

/// Outcome of ingesting several sources for one agent.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// `(source_id, chunks written)` in ingestion order.
    pub ingested: Vec<(String, usize)>,
    /// Sources of a kind this pipeline does not handle.
    pub skipped: Vec<String>,
    pub failures: Vec<(String, RagError)>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_chunks(&self) -> usize {
        self.ingested.iter().map(|(_, n)| n).sum()
    }
}

/// Turns sources into embedded, agent-scoped index entries.
pub struct IngestPipeline {
    index: VectorIndex,
    chunker: Chunker,
    upload_root: PathBuf,
}

impl IngestPipeline {
    pub fn new(index: VectorIndex, chunker: Chunker, upload_root: impl Into<PathBuf>) -> Self {
        Self {
            index,
            chunker,
            upload_root: upload_root.into(),
        }
    }

    /// Ingests one source, replacing whatever the agent previously held for
    /// it. Returns the number of chunks written.
    pub fn ingest(&self, agent_id: &str, source: &Source) -> Result<usize> {
        let blocks = match &source.body {
            SourceBody::Document { file_url } => {
                vec![extract_document(&self.upload_root, &source.id, file_url)?]
            }
            SourceBody::Text { blocks } => text_blocks(blocks),
            SourceBody::Qna { groups } => qna_blocks(groups),
            SourceBody::Website { sites } => website_blocks(agent_id, &source.id, sites),
            SourceBody::Unknown => {
                tracing::warn!(agent_id, source_id = %source.id, "unknown source kind, skipping");
                return Ok(0);
            }
        };

        let chunks: Vec<String> = blocks
            .iter()
            .flat_map(|block| self.chunker.split(block))
            .filter(|c| !c.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            tracing::warn!(agent_id, source_id = %source.id, kind = source.kind(), "source produced no text");
            self.index.remove_source(agent_id, &source.id)?;
            return Ok(0);
        }

        let vectors = self.index.embedder().embed(&chunks)?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "got {} embeddings for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(seq, (text, vector))| IndexEntry {
                id: chunk_id(agent_id, &source.id, seq),
                text,
                vector,
                metadata: ChunkMetadata {
                    source_id: source.id.clone(),
                    source_kind: source.kind().to_string(),
                    sequence_index: seq,
                    title: Some(source.title.clone()).filter(|t| !t.is_empty()),
                },
            })
            .collect();

        // Overwrite in place first so a failed write leaves the old chunks served.
        self.index.upsert(agent_id, &entries)?;
        self.index.prune_source(agent_id, &source.id, entries.len())?;
        tracing::info!(agent_id, source_id = %source.id, kind = source.kind(), chunks = entries.len(), "ingested source");
        Ok(entries.len())
    }

    /// Ingests sources one after another; a failing source is recorded and
    /// the rest still run.
    pub fn ingest_all(&self, agent_id: &str, sources: &[Source]) -> IngestReport {
        let mut report = IngestReport::default();
        for source in sources {
            if source.agent_id != agent_id {
                tracing::warn!(agent_id, source_id = %source.id, owner = %source.agent_id, "source belongs to another agent, skipping");
                report.skipped.push(source.id.clone());
                continue;
            }
            if matches!(source.body, SourceBody::Unknown) {
                tracing::warn!(agent_id, source_id = %source.id, "unknown source kind, skipping");
                report.skipped.push(source.id.clone());
                continue;
            }
            match self.ingest(agent_id, source) {
                Ok(n) => report.ingested.push((source.id.clone(), n)),
                Err(err) => {
                    tracing::error!(agent_id, source_id = %source.id, error = %err, "source ingestion failed");
                    report.failures.push((source.id.clone(), err));
                }
            }
        }
        report
    }

    /// Loads every source of the agent and ingests them.
    pub fn train_agent(&self, agent_id: &str, store: &dyn SourceStore) -> Result<IngestReport> {
        let sources = store.find_sources(agent_id)?;
        let report = self.ingest_all(agent_id, &sources);
        tracing::info!(
            agent_id,
            ingested = report.ingested.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            chunks = report.total_chunks(),
            "agent training finished"
        );
        Ok(report)
    }
}

pub fn chunk_id(agent_id: &str, source_id: &str, seq: usize) -> String {
    format!("{}:{}:{}", agent_id, source_id, seq)
}

fn text_blocks(blocks: &[TextBlock]) -> Vec<String> {
    let joined = blocks
        .iter()
        .map(|b| b.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![joined]
}

/// One block per question so each question is retrievable with its answer.
/// A group without questions falls back to its title.
fn qna_blocks(groups: &[QnaGroup]) -> Vec<String> {
    let mut out = Vec::new();
    for group in groups {
        let answer = group.answer.trim();
        let mut questions: Vec<&str> = group
            .questions
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .collect();
        if questions.is_empty() && !group.title.trim().is_empty() {
            questions.push(group.title.trim());
        }
        for question in questions {
            out.push(format!("Question: {}\nAnswer: {}", question, answer));
        }
    }
    out
}

fn website_blocks(agent_id: &str, source_id: &str, sites: &[WebsiteEntry]) -> Vec<String> {
    // TODO: fetch each crawled link and extract visible text once a crawler is configured.
    let pages: usize = sites.iter().map(|s| s.links.len().max(1)).sum();
    tracing::warn!(agent_id, source_id, pages, "website sources are not crawled yet, nothing indexed");
    Vec::new()
}
