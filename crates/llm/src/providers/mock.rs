//! Deterministic mock collaborator for tests and offline runs.

use crate::client::{
    Confidence, EmbeddingClient, GenerationClient, GenerationOutcome, GenerationRequest,
};
use attest_core::AppResult;

/// Answer returned when the mock generator has no snippets to quote.
const NO_EVIDENCE_ANSWER: &str = "Not specified in provided documents.";

/// Maximum length of a mock answer.
const MAX_MOCK_ANSWER_CHARS: usize = 240;

/// Mock collaborator for testing and development.
///
/// Embeddings are hashed bag-of-words vectors: deterministic, unit-normalized,
/// and content-dependent, so similar texts land near each other without any
/// model call. Generation echoes evidence verbatim, which keeps mock answers
/// lexically supported by their own citations.
#[derive(Debug)]
pub struct MockClient {
    dimensions: usize,
}

impl MockClient {
    /// Create a new mock client with the given embedding dimension.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Generate a deterministic embedding for a text.
    fn mock_embedding(&self, text: &str) -> Vec<f32> {
        if self.dimensions == 0 {
            return Vec::new();
        }

        let mut embedding = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| w.len() > 2)
            .collect();

        for (i, word) in words.iter().enumerate() {
            let dim = (fnv1a(word.as_bytes()) as usize) % self.dimensions;
            embedding[dim] += 1.0;

            // Word pairs give neighboring texts shared off-diagonal mass.
            if let Some(next) = words.get(i + 1) {
                let pair = format!("{} {}", word, next);
                let pair_dim = (fnv1a(pair.as_bytes()) as usize) % self.dimensions;
                embedding[pair_dim] += 0.5;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

/// 64-bit FNV-1a hash.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Truncate text at a word boundary.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) => cut[..pos].trim_end().to_string(),
        None => cut,
    }
}

#[async_trait::async_trait]
impl EmbeddingClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.mock_embedding(t)).collect())
    }
}

#[async_trait::async_trait]
impl GenerationClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> AppResult<GenerationOutcome> {
        let Some(first) = request.snippets.first() else {
            return Ok(GenerationOutcome {
                answer: NO_EVIDENCE_ANSWER.to_string(),
                citation_chunk_ids: Vec::new(),
                confidence: Confidence::Low,
                needs_review: true,
            });
        };

        Ok(GenerationOutcome {
            answer: truncate_at_word(first.quoted_snippet.trim(), MAX_MOCK_ANSWER_CHARS),
            citation_chunk_ids: vec![first.chunk_id.clone()],
            confidence: Confidence::Med,
            needs_review: false,
        })
    }
}
