mod actions;
mod build_prompt;
mod chunk_text;
mod config;
mod embed_chunks;
mod error;
mod extract_text;
mod generate;
mod http;
mod ingest_sources;
mod orchestrator;
mod parse_response;
mod retrieve_chunks;
mod scan_files;
mod sources;
mod store_qdrant;
mod stores;
mod vector_index;

use std::sync::Arc;

pub use actions::{
    decode_actions, load_actions, Action, ActionKind, ActionSpec, ApiCallPayload, ButtonPayload,
    CollectLeadsPayload, HttpMethod, LeadField, RedirectPayload,
};
pub use build_prompt::{
    format_actions, format_context, format_history, PromptComposer, CONTEXT_SEPARATOR,
};
pub use chunk_text::{chunk_text, Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use config::{Config, IndexBackend};
pub use embed_chunks::{Embedder, OllamaEmbedder};
pub use error::{ParseError, RagError, Result};
pub use extract_text::{extract_document, normalize_whitespace};
pub use generate::{Completer, CompletionOptions, OllamaCompleter};
pub use http::{HttpClient, HttpError};
pub use ingest_sources::{chunk_id, IngestPipeline, IngestReport};
pub use orchestrator::{ChatReply, Orchestrator, INVALID_JSON_ANSWER, UNAVAILABLE_ANSWER};
pub use parse_response::{parse_response, ModelResponse};
pub use scan_files::scan_documents;
pub use sources::{QnaGroup, Source, SourceBody, TextBlock, WebsiteEntry};
pub use store_qdrant::QdrantStore;
pub use stores::{
    ActionCatalogue, AgentProfile, AgentProfiles, ChatHistory, ConversationTurn, MemoryStore,
    SourceStore, TokenUsage,
};
pub use vector_index::{
    cosine_similarity, ChunkMetadata, IndexEntry, MemoryVectorStore, VectorIndex, VectorStore,
};

/// Collaborator stores the chat path reads from and logs into.
#[derive(Clone)]
pub struct Stores {
    pub history: Arc<dyn ChatHistory>,
    pub actions: Arc<dyn ActionCatalogue>,
    pub profiles: Arc<dyn AgentProfiles>,
}

impl Stores {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            history: store.clone(),
            actions: store.clone(),
            profiles: store,
        }
    }
}

fn http_client(cfg: &Config) -> Result<HttpClient> {
    HttpClient::new(cfg.http_timeout)
        .map_err(|e| RagError::Configuration(format!("http client: {}", e)))
}

/// Embedder plus the configured vector backend.
pub fn build_index(cfg: &Config) -> Result<VectorIndex> {
    let http = http_client(cfg)?;
    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::from_config(cfg, http.clone()));
    let store: Arc<dyn VectorStore> = match cfg.index_backend {
        IndexBackend::Qdrant => Arc::new(QdrantStore::from_config(cfg, http)),
        IndexBackend::Memory => Arc::new(MemoryVectorStore::new()),
    };
    Ok(VectorIndex::new(embedder, store))
}

pub fn build_ingest(cfg: &Config, index: VectorIndex) -> Result<IngestPipeline> {
    let chunker = Chunker::new(cfg.chunk_size, cfg.chunk_overlap)?;
    Ok(IngestPipeline::new(index, chunker, cfg.upload_root.clone()))
}

pub fn build_orchestrator(
    cfg: &Config,
    index: VectorIndex,
    stores: Stores,
) -> Result<Orchestrator> {
    let completer: Arc<dyn Completer> =
        Arc::new(OllamaCompleter::from_config(cfg, http_client(cfg)?));
    Ok(Orchestrator::new(
        index,
        completer,
        stores.history,
        stores.actions,
        CompletionOptions::from_config(cfg),
    )
    .with_profiles(stores.profiles)
    .with_composer(PromptComposer::new(cfg.history_turns).with_persona(&cfg.system_prompt))
    .with_top_k(cfg.top_k))
}
