use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexBackend {
    Qdrant,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub history_turns: usize,
    pub ollama_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub http_timeout: Duration,
    pub embed_max_retries: usize,
    pub index_backend: IndexBackend,
    pub qdrant_url: String,
    pub collection_prefix: String,
    pub distance: String,
    pub upload_root: PathBuf,
    pub system_prompt: String,
    pub agent_id: String,
    pub user_id: String,
    pub source_dir: String,
    pub include_exts: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub max_file_bytes: u64,
    pub actions_file: Option<PathBuf>,
    pub log_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        // Pick up a local .env so Ollama/Qdrant endpoints work without exporting them.
        let _ = dotenvy::dotenv();
        let index_backend = match env::var("RAG_INDEX_BACKEND")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" | "mem" => IndexBackend::Memory,
            _ => IndexBackend::Qdrant,
        };
        Self {
            chunk_size: parse_var("RAG_CHUNK_SIZE", 500),
            chunk_overlap: parse_var("RAG_CHUNK_OVERLAP", 50),
            top_k: parse_var("RAG_TOP_K", 5),
            history_turns: parse_var("RAG_HISTORY_TURNS", 6),
            ollama_url: string_var("OLLAMA_URL", "http://localhost:11434"),
            embed_model: string_var("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            chat_model: string_var("OLLAMA_CHAT_MODEL", "llama3"),
            temperature: parse_var("RAG_TEMPERATURE", 0.2),
            http_timeout: Duration::from_secs(parse_var("RAG_HTTP_TIMEOUT_SECS", 120)),
            embed_max_retries: parse_var("RAG_EMBED_MAX_RETRIES", 3),
            index_backend,
            qdrant_url: string_var("QDRANT_URL", "http://localhost:6333"),
            collection_prefix: string_var("QDRANT_COLLECTION_PREFIX", "agent"),
            distance: string_var("QDRANT_DISTANCE", "Cosine"),
            upload_root: PathBuf::from(string_var("RAG_UPLOAD_ROOT", "./")),
            system_prompt: string_var("RAG_SYSTEM_PROMPT", "You are a helpful AI agent."),
            agent_id: string_var("RAG_AGENT_ID", "playground"),
            user_id: string_var("RAG_USER_ID", "local"),
            source_dir: string_var("RAG_SOURCE_DIR", "./docs"),
            include_exts: list_var("RAG_INCLUDE_EXTS", ".pdf,.md,.txt", ','),
            exclude_dirs: list_var("RAG_EXCLUDE_DIRS", ".git,target,node_modules", ','),
            max_file_bytes: parse_var("RAG_MAX_FILE_BYTES", 5_000_000),
            actions_file: env::var("RAG_ACTIONS_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_file: PathBuf::from(string_var("RAG_LOG_FILE", "ragent.log")),
        }
    }
}

fn string_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn list_var(key: &str, default: &str, sep: char) -> Vec<String> {
    string_var(key, default)
        .split(sep)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
