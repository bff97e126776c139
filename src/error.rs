use thiserror::Error;

/// Errors surfaced by retrieval, generation, storage and ingestion.
///
/// Upstream dependency failures (embedding, store, generation) are always
/// fatal for the query that hit them. Data-shape anomalies never show up
/// here; they are absorbed where they are found.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    #[error("Vector store error ({backend}): {message}")]
    Store { backend: String, message: String },

    #[error("Generation error ({provider}): {message}")]
    Generation { provider: String, message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn store(backend: &str, message: impl Into<String>) -> Self {
        RagError::Store {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        RagError::Embedding {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn generation(provider: &str, message: impl Into<String>) -> Self {
        RagError::Generation {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
