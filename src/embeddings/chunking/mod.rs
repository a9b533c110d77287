
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;
use tracing::{debug, error, info};

use crate::documents::{Document, DocumentMetadata};
use crate::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 750;

/// Split points tried in order, from paragraph breaks down to single characters
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A bounded piece of a document, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    /// Position of this chunk within its source document
    pub chunk_index: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in tokens
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks of one document
    pub chunk_overlap: usize,
    /// HuggingFace `tokenizer.json` used to count tokens.
    ///
    /// When unset, counts come from [`EstimatedTokenCounter`] and `chunk_size`
    /// bounds the estimate rather than the embedding model's real token count.
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: 0,
            tokenizer_path: None,
        }
    }
}

/// Length function used to size chunks.
///
/// Different language models tokenize differently, so the measure is injected
/// rather than hard-coded into the splitter.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Word and punctuation heuristic, close enough for English prose.
///
/// Chunks sized with it can exceed `chunk_size` model tokens. Exact bounds
/// need `chunking.tokenizer_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatedTokenCounter;

impl TokenCounter for EstimatedTokenCounter {
    #[inline]
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(estimate_token_count(text))
    }
}

/// Exact counts from a HuggingFace tokenizer definition
pub struct TokenizerCounter {
    tokenizer: Tokenizer,
}

impl TokenizerCounter {
    #[inline]
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            RagError::Config(format!(
                "Failed to load tokenizer from {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for TokenizerCounter {
    #[inline]
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| RagError::Chunking(format!("Tokenization failed: {}", e)))?;
        Ok(encoding.len())
    }
}

/// Build the token counter selected by the configuration
#[inline]
pub fn token_counter_for(config: &ChunkingConfig) -> Result<Arc<dyn TokenCounter>> {
    match &config.tokenizer_path {
        Some(path) => {
            info!("Counting tokens with tokenizer at {}", path.display());
            Ok(Arc::new(TokenizerCounter::from_file(path)?))
        }
        None => Ok(Arc::new(EstimatedTokenCounter)),
    }
}

/// Recursive splitter: tries each separator in turn and only falls back to a
/// finer one for pieces that are still too long.
pub struct RecursiveSplitter<'a> {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &'a [&'a str],
    counter: &'a dyn TokenCounter,
}

impl<'a> RecursiveSplitter<'a> {
    #[inline]
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        counter: &'a dyn TokenCounter,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Chunking(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Chunking(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: &DEFAULT_SEPARATORS,
            counter,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_separators(mut self, separators: &'a [&'a str]) -> Self {
        self.separators = separators;
        self
    }

    /// Split `text` into trimmed, non-empty chunks
    #[inline]
    pub fn split_text(&self, text: &str) -> Result<Vec<String>> {
        self.split_recursive(text, self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Result<Vec<String>> {
        let mut chunks = Vec::new();

        let (separator, finer) = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .map_or(("", &[][..]), |i| (separators[i], &separators[i + 1..]));

        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if self.counter.count_tokens(piece)? <= self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting)?);
                fitting.clear();
            }

            if finer.is_empty() {
                // Nothing finer to split on; keep the oversized piece whole
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_recursive(piece, finer)?);
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting)?);
        }

        Ok(chunks)
    }

    /// Greedily join consecutive pieces while the joined text fits
    fn merge_pieces(&self, pieces: &[&str]) -> Result<Vec<String>> {
        let mut merged = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();

        for &piece in pieces {
            if !current.is_empty() && self.joined_len(&current, piece)? > self.chunk_size {
                push_trimmed(&mut merged, &join(&current, ""));
                self.retain_overlap(&mut current, piece)?;
            }
            current.push_back(piece);
        }

        if !current.is_empty() {
            push_trimmed(&mut merged, &join(&current, ""));
        }

        Ok(merged)
    }

    /// Drop pieces from the front until what is left fits the overlap budget
    /// and still leaves room for `next`
    fn retain_overlap(&self, current: &mut VecDeque<&str>, next: &str) -> Result<()> {
        if self.chunk_overlap == 0 {
            current.clear();
            return Ok(());
        }

        while !current.is_empty() {
            let retained = self.counter.count_tokens(&join(current, ""))?;
            let too_long = retained > self.chunk_overlap;
            let crowds_next = retained > 0 && self.joined_len(current, next)? > self.chunk_size;
            if !(too_long || crowds_next) {
                break;
            }
            current.pop_front();
        }

        Ok(())
    }

    fn joined_len(&self, current: &VecDeque<&str>, next: &str) -> Result<usize> {
        self.counter.count_tokens(&join(current, next))
    }
}

fn join(pieces: &VecDeque<&str>, tail: &str) -> String {
    let mut joined: String = pieces.iter().copied().collect();
    joined.push_str(tail);
    joined
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, keeping it at the start of each following piece so
/// that concatenating the pieces restores the input
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text.split_inclusive(|_: char| true).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            if let Some(piece) = text.get(start..index) {
                pieces.push(piece);
            }
            start = index;
        }
    }
    if let Some(rest) = text.get(start..) {
        if !rest.is_empty() {
            pieces.push(rest);
        }
    }
    pieces
}

/// Chunk documents into embedding-ready pieces, each inheriting its
/// document's metadata.
///
/// Never fails: invalid parameters or tokenizer errors are logged and yield an
/// empty result.
#[inline]
pub fn chunk_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
    counter: &dyn TokenCounter,
) -> Vec<Chunk> {
    match try_chunk_documents(documents, chunk_size, chunk_overlap, counter) {
        Ok(chunks) => chunks,
        Err(e) => {
            error!("Error chunking documents: {}", e);
            Vec::new()
        }
    }
}

fn try_chunk_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
    counter: &dyn TokenCounter,
) -> Result<Vec<Chunk>> {
    let splitter = RecursiveSplitter::new(chunk_size, chunk_overlap, counter)?;

    let mut chunks = Vec::new();
    for document in documents {
        let pieces = splitter.split_text(&document.content)?;
        debug!(
            "Split page {} of {} into {} chunks",
            document.metadata.page,
            document.metadata.source,
            pieces.len()
        );
        chunks.extend(
            pieces
                .into_iter()
                .enumerate()
                .map(|(chunk_index, content)| Chunk {
                    content,
                    metadata: document.metadata.clone(),
                    chunk_index,
                }),
        );
    }

    info!(
        "Created {} chunks from {} documents",
        chunks.len(),
        documents.len()
    );

    if !chunks.is_empty() {
        let max_tokens = max_token_length(&chunks, counter)?;
        info!("Maximum chunk length: {} tokens", max_tokens);
    }

    Ok(chunks)
}

/// Longest chunk as measured by `counter`
#[inline]
pub fn max_token_length(chunks: &[Chunk], counter: &dyn TokenCounter) -> Result<usize> {
    let mut max = 0;
    for chunk in chunks {
        max = max.max(counter.count_tokens(&chunk.content)?);
    }
    Ok(max)
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
