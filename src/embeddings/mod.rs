// Embeddings module
// Chunking of loaded documents and the embedding service that vectorizes them

pub mod chunking;
pub mod ollama;

use async_trait::async_trait;

use crate::Result;

pub use chunking::{
    Chunk, ChunkingConfig, EstimatedTokenCounter, RecursiveSplitter, TokenCounter,
    TokenizerCounter, chunk_documents, estimate_token_count, token_counter_for,
};
pub use ollama::OllamaClient;

/// Collaborator that maps text to fixed-dimension vectors.
///
/// Documents and queries go through separate calls so that models with
/// asymmetric query/document encodings can be plugged in.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts, one vector per input in the same order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier recorded in index manifests
    fn model_name(&self) -> &str;
}
