use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("Dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Vector index contains no vectors; build or load an index before searching")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod builder;
pub mod chunker;
pub mod config;
pub mod extract;
pub mod history;
pub mod index;
pub mod ollama;
pub mod query;
pub mod server;
pub mod store;
