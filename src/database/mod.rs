// Database module
// Interchangeable vector index backends and the manifest that describes a persisted index


pub mod flat;
pub mod lancedb;

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::chunking::Chunk;
use crate::{RagError, Result};

pub use flat::FlatIndex;
pub use self::lancedb::LanceIndex;

/// File written next to every persisted index
pub const MANIFEST_FILE: &str = "manifest.json";

/// Storage engine holding the vectors
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// On-disk LanceDB table
    #[default]
    Lance,
    /// In-process brute-force index serialized to JSON
    Flat,
}

impl Backend {
    /// Directory under the index root that holds this backend's files
    #[inline]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Lance => "lancedb",
            Self::Flat => "flat_index",
        }
    }

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lance => "lance",
            Self::Flat => "flat",
        }
    }
}

impl fmt::Display for Backend {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk with its embedding, as stored in an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl IndexEntry {
    #[inline]
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            chunk,
        }
    }
}

/// Search hit, closest first
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
}

/// Nearest-neighbour index over chunk embeddings. Immutable once built.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend(&self) -> Backend;

    /// Up to `k` chunks ordered by ascending distance to `query`
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored entries
    async fn count(&self) -> Result<usize>;
}

/// Description of a persisted index, used to refuse loading an index built
/// with a different embedding model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub backend: Backend,
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    #[inline]
    pub fn new(
        backend: Backend,
        embedding_model: &str,
        dimension: usize,
        chunk_count: usize,
    ) -> Self {
        Self {
            backend,
            embedding_model: embedding_model.to_string(),
            dimension,
            chunk_count,
            created_at: Utc::now(),
        }
    }

    /// Replace the manifest in `dir` through a temp file and rename
    #[inline]
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Database(format!("Failed to serialize manifest: {}", e)))?;
        let tmp_path = dir.join(format!("{}.tmp", MANIFEST_FILE));
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, dir.join(MANIFEST_FILE))?;
        debug!("Wrote index manifest to {}", dir.display());
        Ok(())
    }

    /// Read the manifest in `dir`; a missing file means there is no index
    #[inline]
    pub fn read_from(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(RagError::IndexNotFound(dir.display().to_string()));
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            RagError::Database(format!(
                "Failed to parse manifest {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Check that this index can serve queries embedded with `embedding_model`
    #[inline]
    pub fn ensure_compatible(
        &self,
        backend: Backend,
        embedding_model: &str,
        dimension: usize,
    ) -> Result<()> {
        if self.backend != backend {
            return Err(RagError::IncompatibleIndex(format!(
                "index was built by the {} backend, not {}",
                self.backend, backend
            )));
        }
        if self.embedding_model != embedding_model {
            return Err(RagError::IncompatibleIndex(format!(
                "index was embedded with '{}' but the configured model is '{}'",
                self.embedding_model, embedding_model
            )));
        }
        if self.dimension != dimension {
            return Err(RagError::IncompatibleIndex(format!(
                "index vectors have {} dimensions but {} are configured",
                self.dimension, dimension
            )));
        }
        Ok(())
    }
}

/// Build a fresh index at `dir`, replacing whatever was there
#[inline]
pub async fn create_index(
    backend: Backend,
    dir: &Path,
    entries: Vec<IndexEntry>,
    dimension: usize,
) -> Result<Arc<dyn VectorIndex>> {
    info!(
        "Creating {} index with {} entries at {}",
        backend,
        entries.len(),
        dir.display()
    );

    match backend {
        Backend::Lance => Ok(Arc::new(LanceIndex::create(dir, entries, dimension).await?)),
        Backend::Flat => {
            let index = FlatIndex::build(entries, dimension)?;
            index.save(dir)?;
            Ok(Arc::new(index))
        }
    }
}

/// Open a previously persisted index at `dir`
#[inline]
pub async fn open_index(backend: Backend, dir: &Path) -> Result<Arc<dyn VectorIndex>> {
    if !dir.exists() {
        return Err(RagError::IndexNotFound(dir.display().to_string()));
    }

    match backend {
        Backend::Lance => Ok(Arc::new(LanceIndex::open(dir).await?)),
        Backend::Flat => Ok(Arc::new(FlatIndex::load(dir)?)),
    }
}
