//! Collaborator trait abstractions and request/response types.
//!
//! The answering pipeline consumes two opaque collaborators: one that turns
//! text into a vector, and one that turns a question plus quoted evidence
//! snippets into a draft answer with citations.

use attest_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Confidence level attached to a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Med,
    High,
}

impl Confidence {
    /// Get the canonical wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Med => "med",
            Self::High => "high",
        }
    }

    /// Parse a confidence level, tolerating common synonyms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "med" | "medium" => Some(Self::Med),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// An evidence snippet handed to the generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetRef {
    /// Identifier of the chunk the snippet was quoted from
    pub chunk_id: String,

    /// Name of the source document
    pub doc_name: String,

    /// The quoted snippet text
    pub quoted_snippet: String,
}

/// Generation request: a question plus the evidence it may cite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The question to answer
    pub question: String,

    /// Quoted evidence snippets, in retrieval order
    pub snippets: Vec<SnippetRef>,
}

impl GenerationRequest {
    /// Create a new generation request.
    pub fn new(question: impl Into<String>, snippets: Vec<SnippetRef>) -> Self {
        Self {
            question: question.into(),
            snippets,
        }
    }
}

/// Outcome of a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// Draft answer text
    pub answer: String,

    /// Ids of the snippets the generator claims to have used
    pub citation_chunk_ids: Vec<String>,

    /// Self-reported confidence
    pub confidence: Confidence,

    /// Whether the generator flagged the answer for human review
    pub needs_review: bool,
}

/// Trait for embedding collaborators.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "mock").
    fn provider_name(&self) -> &str;

    /// Get the embedding vector dimension.
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate an embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Collaborator("No embedding returned".to_string()))
    }
}

/// Trait for generation collaborators.
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    /// Get the provider name (e.g., "ollama", "mock").
    fn provider_name(&self) -> &str;

    /// Draft an answer to a question from the provided snippets.
    ///
    /// Implementations must only cite chunk ids present in the request;
    /// the pipeline silently drops anything else.
    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationOutcome>;
}
