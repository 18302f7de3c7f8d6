//! Ollama collaborator implementation.
//!
//! Talks to a local Ollama runtime for both embeddings and grounded answer
//! generation. Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{
    Confidence, EmbeddingClient, GenerationClient, GenerationOutcome, GenerationRequest,
};
use attest_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Ollama /api/generate request format.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Ollama /api/generate response format.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Ollama /api/embeddings request format.
#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

/// Ollama /api/embeddings response format.
#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// The JSON object the generation prompt asks the model to produce.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerPayload {
    answer: String,
    #[serde(default)]
    cited_chunk_ids: Vec<String>,
    confidence: Option<String>,
    #[serde(default)]
    needs_review: bool,
}

/// Ollama client for both collaborator roles.
pub struct OllamaClient {
    /// Base URL for the Ollama API
    base_url: String,

    /// Generation model
    model: String,

    /// Embedding model
    embedding_model: String,

    /// Embedding vector dimension
    dimensions: usize,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new(model: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self::with_base_url("http://localhost:11434", model, embedding_model, 1536)
    }

    /// Create a new Ollama client with a custom base URL and dimension.
    pub fn with_base_url(
        base_url: impl Into<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Build the generation system prompt.
    fn system_prompt() -> String {
        String::from(
            "You answer questionnaire questions using only the evidence snippets provided.\n\n\
             Instructions:\n\
             - Answer only from the snippets; never invent facts\n\
             - If the snippets do not contain the answer, set \"answer\" to exactly: \
             \"Not specified in provided documents.\"\n\
             - Respond with a single JSON object and nothing else, shaped as \
             {\"answer\": string, \"citedChunkIds\": [string], \"confidence\": \
             \"low\"|\"med\"|\"high\", \"needsReview\": boolean}\n\
             - citedChunkIds must only contain ids of snippets you actually used\n",
        )
    }

    /// Build the generation user prompt from a request.
    fn user_prompt(request: &GenerationRequest) -> String {
        let mut prompt = format!("Question:\n{}\n\nEvidence snippets:\n", request.question);

        for snippet in &request.snippets {
            prompt.push_str(&format!(
                "[id: {} | document: {}]\n{}\n\n",
                snippet.chunk_id, snippet.doc_name, snippet.quoted_snippet
            ));
        }

        prompt
    }

    /// Parse the model's reply into an outcome.
    ///
    /// A reply that is not the required JSON object degrades to a
    /// needs-review, zero-citation outcome instead of an error; the
    /// assembler's citation rule then converts it to the sentinel.
    fn parse_outcome(raw: &str) -> GenerationOutcome {
        let trimmed = strip_code_fences(raw);

        match serde_json::from_str::<AnswerPayload>(trimmed) {
            Ok(payload) => GenerationOutcome {
                answer: payload.answer,
                citation_chunk_ids: payload.cited_chunk_ids,
                confidence: payload
                    .confidence
                    .as_deref()
                    .and_then(Confidence::parse)
                    .unwrap_or(Confidence::Low),
                needs_review: payload.needs_review,
            },
            Err(e) => {
                tracing::warn!("Generator reply was not valid JSON ({}), degrading", e);
                GenerationOutcome {
                    answer: raw.trim().to_string(),
                    citation_chunk_ids: Vec::new(),
                    confidence: Confidence::Low,
                    needs_review: true,
                }
            }
        }
    }
}

/// Strip markdown code fences some models wrap JSON replies in.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[async_trait::async_trait]
impl EmbeddingClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut embeddings = Vec::with_capacity(texts.len());

        // Ollama's embeddings endpoint is single-text; issue calls in order.
        for text in texts {
            let request = OllamaEmbeddingRequest {
                model: self.embedding_model.clone(),
                prompt: text.clone(),
            };

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    AppError::Collaborator(format!("Embedding request to Ollama failed: {}", e))
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AppError::Collaborator(format!(
                    "Ollama embeddings API error ({}): {}",
                    status, error_text
                )));
            }

            let parsed: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
                AppError::Collaborator(format!("Failed to parse Ollama embedding: {}", e))
            })?;

            embeddings.push(parsed.embedding);
        }

        Ok(embeddings)
    }
}

#[async_trait::async_trait]
impl GenerationClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationOutcome> {
        tracing::debug!(
            "Sending generation request to Ollama ({} snippets)",
            request.snippets.len()
        );

        let ollama_request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: Self::user_prompt(request),
            system: Self::system_prompt(),
            stream: false,
            format: Some("json".to_string()),
            temperature: Some(0.2), // Low temperature for factual answers
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                AppError::Collaborator(format!("Generation request to Ollama failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Collaborator(format!(
                "Ollama generate API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: OllamaGenerateResponse = response.json().await.map_err(|e| {
            AppError::Collaborator(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(Self::parse_outcome(&parsed.response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SnippetRef;

    #[test]
    fn test_user_prompt_includes_snippet_ids() {
        let request = GenerationRequest::new(
            "Is data encrypted at rest?",
            vec![SnippetRef {
                chunk_id: "c-42".to_string(),
                doc_name: "security.md".to_string(),
                quoted_snippet: "All data is encrypted at rest.".to_string(),
            }],
        );

        let prompt = OllamaClient::user_prompt(&request);
        assert!(prompt.contains("c-42"));
        assert!(prompt.contains("security.md"));
        assert!(prompt.contains("encrypted at rest"));
    }

    #[test]
    fn test_parse_outcome_valid_json() {
        let raw = r#"{"answer": "Yes, with AES-256.", "citedChunkIds": ["c-1"], "confidence": "high", "needsReview": false}"#;
        let outcome = OllamaClient::parse_outcome(raw);

        assert_eq!(outcome.answer, "Yes, with AES-256.");
        assert_eq!(outcome.citation_chunk_ids, vec!["c-1".to_string()]);
        assert_eq!(outcome.confidence, Confidence::High);
        assert!(!outcome.needs_review);
    }

    #[test]
    fn test_parse_outcome_fenced_json() {
        let raw = "```json\n{\"answer\": \"Yes.\", \"citedChunkIds\": [], \"confidence\": \"med\", \"needsReview\": false}\n```";
        let outcome = OllamaClient::parse_outcome(raw);
        assert_eq!(outcome.answer, "Yes.");
        assert_eq!(outcome.confidence, Confidence::Med);
    }

    #[test]
    fn test_parse_outcome_degrades_on_plain_text() {
        let outcome = OllamaClient::parse_outcome("The data is encrypted.");

        assert_eq!(outcome.answer, "The data is encrypted.");
        assert!(outcome.citation_chunk_ids.is_empty());
        assert_eq!(outcome.confidence, Confidence::Low);
        assert!(outcome.needs_review);
    }
}
