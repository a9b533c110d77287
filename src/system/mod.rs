// System module
// Facade tying the document store and the query pipeline together

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::Result;
use crate::config::Config;
use crate::database::Backend;
use crate::documents::{DocumentLoader, FileLoader};
use crate::embeddings::{EmbeddingService, OllamaClient};
use crate::generation::{AnswerGenerator, LanguageModel};
use crate::indexer::{DocumentStore, ProcessStats};
use crate::pipeline::{Pipeline, QueryResponse};
use crate::retriever::ActiveRetriever;

pub use crate::indexer::SystemInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub message: String,
    pub documents_loaded: usize,
    pub chunks_created: usize,
}

impl ProcessOutcome {
    fn from_stats(stats: &ProcessStats) -> Self {
        Self {
            success: true,
            message: format!(
                "Processed {} documents into {} chunks ({} index at {})",
                stats.documents_loaded,
                stats.chunks_created,
                stats.backend,
                stats.index_path.display()
            ),
            documents_loaded: stats.documents_loaded,
            chunks_created: stats.chunks_created,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            documents_loaded: 0,
            chunks_created: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub success: bool,
    pub message: String,
}

/// Entry point for document processing and question answering.
///
/// Every operation reports failures as data rather than `Err`, so callers
/// can always render a result.
pub struct RagSystem {
    store: DocumentStore,
    pipeline: Pipeline,
}

impl RagSystem {
    /// Build a system backed by the configured Ollama server
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(&config.ollama)?);
        Self::with_services(
            config,
            Arc::new(FileLoader),
            Arc::clone(&client) as Arc<dyn EmbeddingService>,
            client,
        )
    }

    #[inline]
    pub fn with_services(
        config: Config,
        loader: Arc<dyn DocumentLoader>,
        embeddings: Arc<dyn EmbeddingService>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let active = ActiveRetriever::new();
        let generator = AnswerGenerator::new(Arc::clone(&model))
            .with_keyword_prefilter(config.generation.keyword_prefilter);
        let pipeline = Pipeline::new(active.clone(), generator);
        let store = DocumentStore::new(config, loader, embeddings, model, active)?;

        Ok(Self { store, pipeline })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        self.store.config()
    }

    #[inline]
    pub async fn process_documents(
        &self,
        file_paths: Option<Vec<PathBuf>>,
        chunk_size: usize,
        backend: Backend,
    ) -> ProcessOutcome {
        match self.store.process(file_paths, chunk_size, backend).await {
            Ok(stats) => ProcessOutcome::from_stats(&stats),
            Err(e) => {
                error!("Error processing documents: {}", e);
                ProcessOutcome::failed(format!("Failed to process documents: {}", e))
            }
        }
    }

    #[inline]
    pub async fn load_existing_index(&self, backend: Backend) -> LoadOutcome {
        match self.store.load_existing(backend).await {
            Ok(chunks) => {
                info!("Loaded {} index with {} chunks", backend, chunks);
                LoadOutcome {
                    success: true,
                    message: format!("Loaded {} index with {} chunks", backend, chunks),
                }
            }
            Err(e) => {
                error!("Error loading {} index: {}", backend, e);
                LoadOutcome {
                    success: false,
                    message: format!("Failed to load {} index: {}", backend, e),
                }
            }
        }
    }

    #[inline]
    pub async fn query(&self, question: &str) -> QueryResponse {
        self.pipeline.run(question).await
    }

    #[inline]
    pub async fn system_info(&self) -> SystemInfo {
        self.store.system_info().await
    }
}
