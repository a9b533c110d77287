// Generation module
// Language-model collaborator and the domain-gated answer generator


use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::Result;

/// Fixed refusal returned for anything outside Model Risk Management or not
/// covered by the retrieved documents
pub const REFUSAL_MESSAGE: &str = "I can only answer questions related to Model Risk Management based on my available documents. Please ask a question about MRM topics, model validation, risk governance, or regulatory compliance.";

/// Context used when retrieval produced nothing
pub const NO_DOCUMENTS_CONTEXT: &str = "No relevant documents found.";

/// Lowercase fragments that mark a query as belonging to the MRM domain
const MRM_KEYWORDS: &[&str] = &[
    "mrm",
    "model",
    "validat",
    "sr 11",
    "sr11",
    "basel",
    "ccar",
    "dfast",
    "governance",
    "risk",
    "regulat",
    "compliance",
    "backtest",
    "benchmark",
    "stress test",
    "audit",
    "inventory",
    "calibrat",
    "monitoring",
    "assumption",
    "limitation",
];

const SYSTEM_PROMPT: &str = "You are a specialized Model Risk Management (MRM) assistant. You can ONLY answer questions that are:
1. Directly related to Model Risk Management
2. Covered in the provided document context
3. About regulatory compliance (SR 11-7, Basel III, CCAR/DFAST, etc.)
4. Related to model validation, governance, or risk assessment
5. About MRM frameworks, policies, or procedures

CRITICAL RULES:
- If the question is NOT about MRM or NOT covered in the context, respond with exactly: \"I can only answer questions related to Model Risk Management based on my available documents. Please ask a question about MRM topics, model validation, risk governance, or regulatory compliance.\"
- Only use information from the provided context
- Do not provide general knowledge outside the context
- Do not answer questions about other topics (coding, general AI, etc.)
- Be specific and reference the document content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a chat exchange, serialized in the Ollama wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Collaborator that completes a chat exchange
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Produces answers restricted to the MRM domain.
///
/// The topical gate is enforced by prompting and is therefore best-effort: a
/// model can still answer an off-topic question. Only the empty-context gate
/// and the optional keyword pre-filter are deterministic.
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    keyword_prefilter: bool,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            keyword_prefilter: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_keyword_prefilter(mut self, enabled: bool) -> Self {
        self.keyword_prefilter = enabled;
        self
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer `query` from `context`. Never fails: model errors become the
    /// answer text.
    #[inline]
    pub async fn generate(&self, query: &str, context: &str) -> String {
        if context.trim().is_empty() || context.trim() == NO_DOCUMENTS_CONTEXT {
            debug!("No context available, refusing without calling the model");
            return REFUSAL_MESSAGE.to_string();
        }

        if self.keyword_prefilter && !is_domain_query(query) {
            info!("Query rejected by keyword pre-filter: {}", query);
            return REFUSAL_MESSAGE.to_string();
        }

        let messages = build_messages(query, context);
        match self.model.complete(&messages).await {
            Ok(response) => normalize_refusal(&response),
            Err(e) => {
                error!("Error generating answer: {}", e);
                format!("Error generating response: {}", e)
            }
        }
    }
}

/// Prompt asking the model to check domain membership and context relevance
/// before answering
#[inline]
pub fn build_messages(query: &str, context: &str) -> Vec<ChatMessage> {
    let prompt = format!(
        "Available Context from MRM Documents:
{context}

User Question: {query}

Instructions:
1. First, determine if this is an MRM-related question
2. Check if the context contains relevant information
3. If YES to both: Provide a detailed, professional MRM answer
4. If NO to either: reply with the exact refusal sentence from your rules and nothing else
5. Always cite specific information from the context when possible
6. Use professional MRM terminology and frameworks

Answer:"
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

/// Whether `query` mentions any MRM keyword
#[inline]
pub fn is_domain_query(query: &str) -> bool {
    let query = query.to_lowercase();
    MRM_KEYWORDS.iter().any(|keyword| query.contains(keyword))
}

/// Map a response that is the refusal sentence, give or take quotes and
/// whitespace, to the exact refusal constant
#[inline]
pub fn normalize_refusal(response: &str) -> String {
    let stripped = response
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '\u{201c}' | '\u{201d}' | '`'))
        .trim();

    if stripped == REFUSAL_MESSAGE {
        REFUSAL_MESSAGE.to_string()
    } else {
        response.trim().to_string()
    }
}
