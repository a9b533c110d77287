// Documents module
// Turns files on disk into page-level documents ready for chunking

#[cfg(test)]
mod tests;

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// File extensions the default loader knows how to read
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Raw text of one page of a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Provenance carried from a document onto every chunk cut from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path of the file the text was read from
    pub source: String,
    /// Zero-based page number within the source
    pub page: u32,
    pub total_pages: u32,
}

/// Collaborator that turns a single file into documents
pub trait DocumentLoader: Send + Sync {
    /// Whether this loader can read the given file
    fn supports(&self, path: &Path) -> bool;

    /// Load every page of `path`
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Default loader: PDFs page by page, plain text and markdown as a single page
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    fn load_pdf(path: &Path) -> Result<Vec<String>> {
        // pdf-extract panics on some malformed inputs
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(path)
        }))
        .map_err(|_| RagError::Load(format!("PDF parser panicked on {}", path.display())))?;

        extracted.map_err(|e| {
            RagError::Load(format!("Failed to extract text from {}: {}", path.display(), e))
        })
    }

    fn load_text(path: &Path) -> Result<Vec<String>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => String::from_utf8_lossy(&fs::read(path)?).to_string(),
        };
        Ok(vec![content])
    }
}

impl DocumentLoader for FileLoader {
    #[inline]
    fn supports(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }

    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let pages = match extension_of(path).as_deref() {
            Some("pdf") => Self::load_pdf(path)?,
            Some("txt" | "md") => Self::load_text(path)?,
            _ => {
                return Err(RagError::Load(format!(
                    "Unsupported file type: {}",
                    path.display()
                )));
            }
        };

        let total_pages = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        let source = path.display().to_string();

        let documents: Vec<Document> = pages
            .into_iter()
            .zip(0..)
            .filter(|(content, _)| !content.trim().is_empty())
            .map(|(content, page)| Document {
                content,
                metadata: DocumentMetadata {
                    source: source.clone(),
                    page,
                    total_pages,
                },
            })
            .collect();

        debug!(
            "Loaded {} non-empty pages of {} from {}",
            documents.len(),
            total_pages,
            source
        );
        Ok(documents)
    }
}

/// Lowercased extension, so `REPORT.PDF` is treated like `report.pdf`
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Recursively list the files under `dir` that `loader` supports, sorted by path.
/// A missing directory yields an empty list.
#[inline]
pub fn discover_documents(dir: &Path, loader: &dyn DocumentLoader) -> Vec<PathBuf> {
    if !dir.exists() {
        debug!("Documents directory {} does not exist", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| loader.supports(path))
        .collect();

    files.sort();
    files
}

/// Load documents from explicit paths, or from every supported file under
/// `docs_dir` when `file_paths` is `None`.
///
/// Unsupported paths are ignored and unreadable files are logged and skipped,
/// so the result may be empty; deciding whether that is fatal is up to the caller.
#[inline]
pub fn load_documents(
    loader: &dyn DocumentLoader,
    file_paths: Option<&[PathBuf]>,
    docs_dir: &Path,
) -> Vec<Document> {
    let candidates = match file_paths {
        Some(paths) => paths
            .iter()
            .filter(|path| {
                let supported = loader.supports(path);
                if !supported {
                    warn!("Ignoring unsupported file: {}", path.display());
                }
                supported
            })
            .cloned()
            .collect(),
        None => discover_documents(docs_dir, loader),
    };

    let mut documents = Vec::new();
    for path in &candidates {
        match loader.load(path) {
            Ok(docs) => {
                info!("Loaded {} pages from {}", docs.len(), path.display());
                documents.extend(docs);
            }
            Err(e) => error!("Error loading {}: {}", path.display(), e),
        }
    }

    info!(
        "Loaded {} documents from {} files",
        documents.len(),
        candidates.len()
    );
    documents
}
