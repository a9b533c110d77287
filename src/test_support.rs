// Deterministic stand-ins for the embedding and language models used by tests

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embeddings::EmbeddingService;
use crate::generation::{ChatMessage, LanguageModel, REFUSAL_MESSAGE, is_domain_query};
use crate::retriever::NO_OUTPUT;
use crate::{RagError, Result};

pub const TEST_DIMENSION: usize = 64;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "does", "for", "from", "how", "in", "is",
    "it", "of", "on", "or", "the", "to", "under", "what", "which", "with",
];

/// Lowercase content words of `text`
#[inline]
pub fn content_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}

fn shares_content_word(a: &str, b: &str) -> bool {
    let b_words = content_words(b);
    content_words(a).iter().any(|word| b_words.contains(word))
}

/// Bag-of-words embedder: each content word is hashed into one of
/// `dimension` buckets and the result is L2-normalized
pub struct HashingEmbedder {
    dimension: usize,
    model: &'static str,
    fail: bool,
    pub calls: AtomicUsize,
}

impl Default for HashingEmbedder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl HashingEmbedder {
    #[inline]
    pub fn new() -> Self {
        Self {
            dimension: TEST_DIMENSION,
            model: "hashing-test-embedder",
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Same vectors, reported under another model name
    #[inline]
    pub fn named(model: &'static str) -> Self {
        Self {
            model,
            ..Self::new()
        }
    }

    #[inline]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    #[inline]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::new()
        }
    }

    #[inline]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in content_words(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbedder {
    #[inline]
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Embedding("embedding service unavailable".to_string()));
        }
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    #[inline]
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Embedding("embedding service unavailable".to_string()));
        }
        Ok(self.embed(text))
    }

    #[inline]
    fn model_name(&self) -> &str {
        self.model
    }
}

/// Scripted model that understands the extraction and answer prompts.
///
/// Extraction keeps a chunk when it shares a content word with the question.
/// Answers quote the context for MRM questions and refuse everything else.
pub struct MockLanguageModel {
    fail: Option<String>,
    pub calls: AtomicUsize,
}

impl Default for MockLanguageModel {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MockLanguageModel {
    #[inline]
    pub fn new() -> Self {
        Self {
            fail: None,
            calls: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn between<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    text.split_once(start)
        .map(|(_, rest)| rest.split_once(end).map_or(rest, |(inner, _)| inner))
        .unwrap_or_default()
}

fn extract(prompt: &str) -> String {
    let question = between(prompt, "> Question: ", "\n> Context:");
    let context = between(prompt, ">>>\n", "\n>>>");
    if shares_content_word(question, context) {
        context.to_string()
    } else {
        NO_OUTPUT.to_string()
    }
}

fn answer(prompt: &str) -> String {
    let context = between(prompt, "Available Context from MRM Documents:\n", "\n\nUser Question:");
    let question = between(prompt, "User Question: ", "\n");

    if !is_domain_query(question) || !shares_content_word(question, context) {
        return REFUSAL_MESSAGE.to_string();
    }

    let cited: Vec<&str> = context
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("Document "))
        .collect();
    format!("According to the documents: {}", cited.join(" "))
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    #[inline]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail {
            return Err(RagError::Generation(message.clone()));
        }

        let prompt = messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        if prompt.contains("Extracted relevant parts:") {
            Ok(extract(prompt))
        } else {
            Ok(answer(prompt))
        }
    }

    #[inline]
    fn model_name(&self) -> &str {
        "mock-mrm-model"
    }
}
