// Indexer module
// Owns the on-disk indexes: builds them from documents, reopens them, and installs retrievers

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{
    Backend, IndexEntry, IndexManifest, VectorIndex, create_index, open_index,
};
use crate::documents::{DocumentLoader, discover_documents, load_documents};
use crate::embeddings::EmbeddingService;
use crate::embeddings::chunking::{Chunk, TokenCounter, chunk_documents, token_counter_for};
use crate::generation::LanguageModel;
use crate::retriever::{ActiveRetriever, LlmChainExtractor, Retriever};
use crate::{RagError, Result};

/// Outcome of a successful processing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    pub documents_loaded: usize,
    pub chunks_created: usize,
    pub backend: Backend,
    pub index_path: PathBuf,
}

/// Snapshot of what the system is configured with and what it has indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub docs_directory: PathBuf,
    pub index_path: PathBuf,
    pub backend_type: Backend,
    pub retriever_ready: bool,
    pub embedding_model: String,
    pub generator_model: String,
    pub document_count: usize,
    pub document_list: Vec<String>,
    /// Chunks in the active index, or in the persisted one when nothing is loaded
    pub indexed_chunks: Option<usize>,
}

/// Single writer for the persisted indexes
pub struct DocumentStore {
    config: Config,
    loader: Arc<dyn DocumentLoader>,
    embeddings: Arc<dyn EmbeddingService>,
    model: Arc<dyn LanguageModel>,
    counter: Arc<dyn TokenCounter>,
    active: ActiveRetriever,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    #[inline]
    pub fn new(
        config: Config,
        loader: Arc<dyn DocumentLoader>,
        embeddings: Arc<dyn EmbeddingService>,
        model: Arc<dyn LanguageModel>,
        active: ActiveRetriever,
    ) -> Result<Self> {
        let counter = token_counter_for(&config.chunking)?;

        Ok(Self {
            config,
            loader,
            embeddings,
            model,
            counter,
            active,
            write_lock: Mutex::new(()),
        })
    }

    #[inline]
    #[must_use]
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn active_retriever(&self) -> &ActiveRetriever {
        &self.active
    }

    /// Load, chunk, embed and index documents, then make the new index the
    /// active one. On failure the previously active retriever stays in place.
    #[inline]
    pub async fn process(
        &self,
        file_paths: Option<Vec<PathBuf>>,
        chunk_size: usize,
        backend: Backend,
    ) -> Result<ProcessStats> {
        let _guard = self.write_lock.lock().await;
        info!(
            "Processing documents into {} index with chunk size {}",
            backend, chunk_size
        );

        let (documents_loaded, chunks) = self.load_and_chunk(file_paths, chunk_size).await?;
        let chunks_created = chunks.len();

        let entries = self.embed_chunks(chunks).await?;

        let index_path = self.config.backend_path(backend);
        let dimension = self.dimension();

        // Earlier snapshots keep reading the index version they were opened on
        let index = create_index(backend, &index_path, entries, dimension).await?;
        IndexManifest::new(
            backend,
            self.embeddings.model_name(),
            dimension,
            chunks_created,
        )
        .write_to(&index_path)?;

        self.active.install(self.build_retriever(index)).await;

        info!(
            "Processed {} documents into {} chunks at {}",
            documents_loaded,
            chunks_created,
            index_path.display()
        );

        Ok(ProcessStats {
            documents_loaded,
            chunks_created,
            backend,
            index_path,
        })
    }

    async fn load_and_chunk(
        &self,
        file_paths: Option<Vec<PathBuf>>,
        chunk_size: usize,
    ) -> Result<(usize, Vec<Chunk>)> {
        let loader = Arc::clone(&self.loader);
        let counter = Arc::clone(&self.counter);
        let docs_dir = self.config.docs_dir();
        let chunk_overlap = self.config.chunking.chunk_overlap;

        let (documents_loaded, chunks) = tokio::task::spawn_blocking(move || {
            let documents = load_documents(loader.as_ref(), file_paths.as_deref(), &docs_dir);
            let chunks = chunk_documents(&documents, chunk_size, chunk_overlap, counter.as_ref());
            (documents.len(), chunks)
        })
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Document loading task failed: {}", e)))?;

        if documents_loaded == 0 {
            return Err(RagError::Load("No documents were loaded".to_string()));
        }
        if chunks.is_empty() {
            return Err(RagError::Chunking(
                "No chunks were created from the loaded documents".to_string(),
            ));
        }

        Ok((documents_loaded, chunks))
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
        let dimension = self.dimension();
        let batch_size = (self.config.ollama.batch_size as usize).max(1);

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(chunks.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = match self.embeddings.embed_documents(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            };

            if vectors.len() != batch.len() {
                bar.abandon();
                return Err(RagError::Embedding(format!(
                    "Expected {} embeddings but received {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
                bar.abandon();
                return Err(RagError::Embedding(format!(
                    "Embedding model returned {} dimensions but {} are configured",
                    bad.len(),
                    dimension
                )));
            }

            entries.extend(
                vectors
                    .into_iter()
                    .zip(batch.iter().cloned())
                    .map(|(vector, chunk)| IndexEntry::new(vector, chunk)),
            );
            bar.inc(batch.len() as u64);
            debug!("Embedded {}/{} chunks", entries.len(), chunks.len());
        }

        bar.finish_and_clear();
        Ok(entries)
    }

    /// Reopen the persisted index for `backend` without re-embedding anything.
    /// Returns the number of indexed chunks.
    #[inline]
    pub async fn load_existing(&self, backend: Backend) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let index_path = self.config.backend_path(backend);
        info!("Loading existing {} index from {}", backend, index_path.display());

        let manifest = IndexManifest::read_from(&index_path)?;
        manifest.ensure_compatible(backend, self.embeddings.model_name(), self.dimension())?;

        let index = open_index(backend, &index_path).await?;
        let chunk_count = index.count().await?;
        if chunk_count != manifest.chunk_count {
            warn!(
                "Manifest lists {} chunks but the index holds {}",
                manifest.chunk_count, chunk_count
            );
        }

        self.active.install(self.build_retriever(index)).await;
        Ok(chunk_count)
    }

    #[inline]
    pub async fn system_info(&self) -> SystemInfo {
        let snapshot = self.active.snapshot().await;

        let backend_type = snapshot
            .as_ref()
            .map_or(self.config.storage.default_backend, |r| r.backend());
        let index_path = self.config.backend_path(backend_type);

        let indexed_chunks = match &snapshot {
            Some(retriever) => retriever.indexed_chunks().await.ok(),
            None => IndexManifest::read_from(&index_path)
                .ok()
                .map(|manifest| manifest.chunk_count),
        };

        let docs_directory = self.config.docs_dir();
        let loader = Arc::clone(&self.loader);
        let scan_dir = docs_directory.clone();
        let document_list: Vec<String> = tokio::task::spawn_blocking(move || {
            discover_documents(&scan_dir, loader.as_ref())
                .iter()
                .map(|path| path.display().to_string())
                .collect()
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Document scan task failed: {}", e);
            Vec::new()
        });

        SystemInfo {
            docs_directory,
            index_path,
            backend_type,
            retriever_ready: snapshot.is_some(),
            embedding_model: self.embeddings.model_name().to_string(),
            generator_model: self.model.model_name().to_string(),
            document_count: document_list.len(),
            document_list,
            indexed_chunks,
        }
    }

    fn dimension(&self) -> usize {
        self.config.ollama.embedding_dimension as usize
    }

    fn build_retriever(&self, index: Arc<dyn VectorIndex>) -> Retriever {
        let retriever = Retriever::new(index, Arc::clone(&self.embeddings));
        if self.config.retrieval.compress {
            retriever.with_compressor(LlmChainExtractor::new(Arc::clone(&self.model)))
        } else {
            retriever
        }
    }
}
