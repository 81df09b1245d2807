/// Errors surfaced at component boundaries of the answer pipeline.
///
/// Each variant names the stage that failed. Callers decide whether a
/// variant degrades (fallback answer, empty context) or propagates.
#[derive(thiserror::Error, Debug)]
pub enum RagError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("vector dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("extraction failed for source {source_id}: {message}")]
    Extraction { source_id: String, message: String },

    #[error("completion unavailable: {0}")]
    CompletionUnavailable(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("store: {0}")]
    Store(String),
}

/// Why a raw model output could not become a [`crate::ModelResponse`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("model output has no string \"answer\" field")]
    MissingAnswer,
}

pub type Result<T> = std::result::Result<T, RagError>;
