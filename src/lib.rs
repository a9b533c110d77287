use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document loading error: {0}")]
    Load(String),

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("No persisted index found at {0}")]
    IndexNotFound(String),

    #[error("Persisted index is incompatible with the current configuration: {0}")]
    IncompatibleIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod generation;
pub mod indexer;
pub mod pipeline;
pub mod retriever;
pub mod system;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use system::RagSystem;
