// Flat vector index
// Exact brute-force search over an in-memory list, persisted as a single JSON file


use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Backend, IndexEntry, ScoredChunk, VectorIndex};
use crate::{RagError, Result};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Build an index, rejecting vectors whose length differs from `dimension`
    #[inline]
    pub fn build(entries: Vec<IndexEntry>, dimension: usize) -> Result<Self> {
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(RagError::Database(format!(
                "Entry {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                dimension
            )));
        }

        Ok(Self { dimension, entries })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the index to `dir/index.json`, replacing any previous index
    #[inline]
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let content = serde_json::to_vec(self)
            .map_err(|e| RagError::Database(format!("Failed to serialize flat index: {}", e)))?;

        // Readers must never observe a partially written index
        let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, dir.join(INDEX_FILE))?;

        info!(
            "Saved flat index with {} entries to {}",
            self.entries.len(),
            dir.display()
        );
        Ok(())
    }

    #[inline]
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Err(RagError::IndexNotFound(dir.display().to_string()));
        }

        let content = fs::read(&path)?;
        let index: Self = serde_json::from_slice(&content).map_err(|e| {
            RagError::Database(format!(
                "Failed to parse flat index {}: {}",
                path.display(),
                e
            ))
        })?;

        // The file may have been edited by hand
        let index = Self::build(index.entries, index.dimension)?;
        debug!(
            "Loaded flat index with {} entries from {}",
            index.entries.len(),
            dir.display()
        );
        Ok(index)
    }

    /// Exact nearest neighbours; ties keep insertion order
    #[inline]
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimension {
            return Err(RagError::Database(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, squared_l2(query, &entry.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(k)
            .filter_map(|(position, distance)| {
                self.entries.get(position).map(|entry| ScoredChunk {
                    chunk: entry.chunk.clone(),
                    distance,
                })
            })
            .collect())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[async_trait]
impl VectorIndex for FlatIndex {
    #[inline]
    fn backend(&self) -> Backend {
        Backend::Flat
    }

    #[inline]
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.nearest(query, k)
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}
