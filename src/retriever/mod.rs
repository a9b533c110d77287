// Retriever module
// Nearest-neighbour search followed by optional language-model compression of each hit


use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Result;
use crate::database::{Backend, VectorIndex};
use crate::embeddings::EmbeddingService;
use crate::embeddings::chunking::Chunk;
use crate::generation::{ChatMessage, LanguageModel};

/// Candidates fetched from the index before compression
pub const SEARCH_K: usize = 8;

/// Reply meaning "nothing in this chunk is relevant"
pub const NO_OUTPUT: &str = "NO_OUTPUT";

/// Asks a language model to keep only the parts of each chunk that bear on
/// the question, dropping chunks with nothing relevant
#[derive(Clone)]
pub struct LlmChainExtractor {
    model: Arc<dyn LanguageModel>,
}

impl LlmChainExtractor {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Compress chunks one at a time, in order
    #[inline]
    pub async fn compress(&self, query: &str, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let candidates = chunks.len();
        let mut kept = Vec::with_capacity(candidates);

        for mut chunk in chunks {
            let messages = [ChatMessage::user(extraction_prompt(query, &chunk.content))];
            let response = self.model.complete(&messages).await?;

            if let Some(extracted) = parse_extraction(&response) {
                chunk.content = extracted;
                kept.push(chunk);
            }
        }

        debug!(
            "Extraction kept {} of {} candidate chunks",
            kept.len(),
            candidates
        );
        Ok(kept)
    }
}

#[inline]
pub fn extraction_prompt(query: &str, context: &str) -> String {
    format!(
        "Given the following question and context, extract any part of the context *AS IS* that is relevant to answer the question. If none of the context is relevant return {NO_OUTPUT}.

Remember, *DO NOT* edit the extracted parts of the context.

> Question: {query}
> Context:
>>>
{context}
>>>
Extracted relevant parts:"
    )
}

/// `None` when the model reported nothing relevant
#[inline]
pub fn parse_extraction(response: &str) -> Option<String> {
    let trimmed = response.trim();
    (!trimmed.is_empty() && trimmed != NO_OUTPUT).then(|| trimmed.to_string())
}

/// Embeds a query, searches the index and optionally compresses the hits
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingService>,
    compressor: Option<LlmChainExtractor>,
    k: usize,
}

impl Retriever {
    #[inline]
    pub fn new(index: Arc<dyn VectorIndex>, embeddings: Arc<dyn EmbeddingService>) -> Self {
        Self {
            index,
            embeddings,
            compressor: None,
            k: SEARCH_K,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_compressor(mut self, compressor: LlmChainExtractor) -> Self {
        self.compressor = Some(compressor);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    #[inline]
    pub fn backend(&self) -> Backend {
        self.index.backend()
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn is_compressing(&self) -> bool {
        self.compressor.is_some()
    }

    /// Number of chunks in the underlying index
    #[inline]
    pub async fn indexed_chunks(&self) -> Result<usize> {
        self.index.count().await
    }

    /// Chunks relevant to `query`, most similar first
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let query_vector = self.embeddings.embed_query(query).await?;
        let hits = self.index.search(&query_vector, self.k).await?;
        debug!("Index returned {} candidates", hits.len());

        let chunks: Vec<Chunk> = hits.into_iter().map(|hit| hit.chunk).collect();

        match &self.compressor {
            Some(compressor) => compressor.compress(query, chunks).await,
            None => Ok(chunks),
        }
    }
}

/// Shared handle to the retriever queries run against.
///
/// Readers take a cloned snapshot, so replacing the retriever never affects
/// a query already in flight.
#[derive(Clone, Default)]
pub struct ActiveRetriever {
    inner: Arc<RwLock<Option<Arc<Retriever>>>>,
}

impl ActiveRetriever {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub async fn snapshot(&self) -> Option<Arc<Retriever>> {
        self.inner.read().await.clone()
    }

    #[inline]
    pub async fn install(&self, retriever: Retriever) {
        let backend = retriever.backend();
        *self.inner.write().await = Some(Arc::new(retriever));
        info!("Installed {} retriever", backend);
    }

    #[inline]
    pub async fn is_ready(&self) -> bool {
        self.inner.read().await.is_some()
    }
}
