// Pipeline module
// Linear query flow: retrieve, contextualize, generate


use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embeddings::chunking::Chunk;
use crate::generation::{AnswerGenerator, NO_DOCUMENTS_CONTEXT};
use crate::retriever::{ActiveRetriever, Retriever};

/// Documents that make it into the prompt context
pub const CONTEXT_DOCUMENT_LIMIT: usize = 5;

pub const NO_RETRIEVER_ERROR: &str = "No retriever initialized";

/// Per-query bookkeeping; absent keys are omitted when serialized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a query accumulates on its way through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub query: String,
    pub documents: Vec<Chunk>,
    pub context: String,
    pub answer: String,
    pub metadata: QueryMetadata,
}

impl PipelineState {
    #[inline]
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            documents: Vec::new(),
            context: String::new(),
            answer: String::new(),
            metadata: QueryMetadata::default(),
        }
    }
}

/// Result of a query as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub context: String,
    pub documents_retrieved: usize,
    pub metadata: QueryMetadata,
    pub timestamp: DateTime<Utc>,
}

/// RETRIEVE: never fails, errors land in `metadata.error`
#[inline]
pub async fn retrieve(mut state: PipelineState, retriever: Option<&Retriever>) -> PipelineState {
    let Some(retriever) = retriever else {
        state.documents = Vec::new();
        state.metadata = QueryMetadata {
            error: Some(NO_RETRIEVER_ERROR.to_string()),
            ..QueryMetadata::default()
        };
        return state;
    };

    match retriever.retrieve(&state.query).await {
        Ok(documents) => {
            debug!("Retrieved {} documents", documents.len());
            state.metadata = QueryMetadata {
                retrieved_count: Some(documents.len()),
                timestamp: Some(Utc::now()),
                error: None,
            };
            state.documents = documents;
        }
        Err(e) => {
            error!("Error retrieving documents: {}", e);
            state.documents = Vec::new();
            state.metadata = QueryMetadata {
                error: Some(e.to_string()),
                ..QueryMetadata::default()
            };
        }
    }

    state
}

/// CONTEXTUALIZE: label the first few documents, or fall back to the sentinel
#[inline]
pub fn contextualize(mut state: PipelineState) -> PipelineState {
    state.context = if state.documents.is_empty() {
        NO_DOCUMENTS_CONTEXT.to_string()
    } else {
        state
            .documents
            .iter()
            .take(CONTEXT_DOCUMENT_LIMIT)
            .enumerate()
            .map(|(i, doc)| format!("Document {}:\n{}\n", i + 1, doc.content))
            .join("\n")
    };
    state
}

/// GENERATE
#[inline]
pub async fn generate(mut state: PipelineState, generator: &AnswerGenerator) -> PipelineState {
    state.answer = generator.generate(&state.query, &state.context).await;
    state
}

/// DONE
#[inline]
pub fn finish(state: PipelineState) -> QueryResponse {
    QueryResponse {
        documents_retrieved: state.documents.len(),
        answer: state.answer,
        context: state.context,
        metadata: state.metadata,
        timestamp: Utc::now(),
    }
}

/// Runs queries against whichever retriever is active when the query starts
#[derive(Clone)]
pub struct Pipeline {
    active: ActiveRetriever,
    generator: AnswerGenerator,
}

impl Pipeline {
    #[inline]
    pub fn new(active: ActiveRetriever, generator: AnswerGenerator) -> Self {
        Self { active, generator }
    }

    #[inline]
    pub async fn run(&self, query: &str) -> QueryResponse {
        info!("Processing query: {}", query);

        let snapshot = self.active.snapshot().await;

        let state = PipelineState::new(query);
        let state = retrieve(state, snapshot.as_deref()).await;
        let state = contextualize(state);
        let state = generate(state, &self.generator).await;

        let response = finish(state);
        info!(
            "Query answered with {} documents retrieved",
            response.documents_retrieved
        );
        response
    }
}
