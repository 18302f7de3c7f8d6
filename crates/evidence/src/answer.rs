//! Grounded answer assembly.
//!
//! Orchestrates one question through the full pipeline: embed, retrieve,
//! gate on evidence sufficiency, generate, map citations back to retrieved
//! chunks, and claim-check the draft. Collaborator failures propagate;
//! missing or rejected evidence never does, it becomes the sentinel.

use crate::guardrail::apply_claim_check;
use crate::retrieve::retrieve_top_chunks;
use crate::store::VectorStore;
use crate::types::{
    AnswerResult, Citation, DebugTrace, DroppedCitation, RetrievedSummary, SENTINEL_ANSWER,
};
use attest_core::AppResult;
use attest_llm::{EmbeddingClient, GenerationClient, GenerationRequest, SnippetRef};
use std::sync::Arc;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum top similarity required to attempt generation.
///
/// Below this the evidence is too weak to ground an answer and the sentinel
/// is returned without calling the generator.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.35;

/// Default character budget for quoted snippets.
pub const DEFAULT_SNIPPET_CHARS: usize = 600;

/// Tuning for the assembler.
#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub top_k: usize,
    pub snippet_chars: usize,
    pub min_similarity: f32,

    /// Attach a [`DebugTrace`] to every result
    pub debug_enabled: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            debug_enabled: false,
        }
    }
}

/// The grounded answer assembler.
pub struct Assembler {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    generator: Arc<dyn GenerationClient>,
    options: AssemblerOptions,
}

impl Assembler {
    /// Create an assembler over the given collaborators.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            options,
        }
    }

    /// Answer one question for an organization.
    ///
    /// Embedding, retrieval, and generation failures propagate as errors and
    /// abort this question; insufficient or rejected evidence returns the
    /// sentinel instead.
    pub async fn answer_question(
        &self,
        org_id: &str,
        question_text: &str,
    ) -> AppResult<AnswerResult> {
        let mut trace = if self.options.debug_enabled {
            Some(DebugTrace::default())
        } else {
            None
        };

        if self.store.embedded_chunk_count(org_id).await? == 0 {
            tracing::info!("Org '{}' has no embedded chunks, skipping retrieval", org_id);
            return Ok(attach(
                AnswerResult::not_specified("no documents have been ingested", vec![]),
                trace,
            ));
        }

        let embedding = self.embedder.embed(question_text).await?;

        let retrieved = retrieve_top_chunks(
            self.store.as_ref(),
            org_id,
            &embedding,
            question_text,
            self.options.top_k,
            self.options.snippet_chars,
        )
        .await?;

        if let Some(trace) = trace.as_mut() {
            trace.retrieved = retrieved
                .iter()
                .map(|c| RetrievedSummary {
                    chunk_id: c.chunk_id.clone(),
                    doc_name: c.doc_name.clone(),
                    similarity: c.similarity,
                })
                .collect();
        }

        let top_similarity = retrieved.first().map(|c| c.similarity).unwrap_or(0.0);
        if retrieved.is_empty() || top_similarity < self.options.min_similarity {
            tracing::info!(
                "Evidence too weak for question (top similarity {:.3} < {:.2})",
                top_similarity,
                self.options.min_similarity
            );
            return Ok(attach(
                AnswerResult::not_specified(
                    format!(
                        "no sufficiently similar evidence (top similarity {:.3})",
                        top_similarity
                    ),
                    vec![],
                ),
                trace,
            ));
        }

        if let Some(trace) = trace.as_mut() {
            trace.post_filter_chunk_ids = retrieved.iter().map(|c| c.chunk_id.clone()).collect();
        }

        let request = GenerationRequest::new(
            question_text,
            retrieved
                .iter()
                .map(|c| SnippetRef {
                    chunk_id: c.chunk_id.clone(),
                    doc_name: c.doc_name.clone(),
                    quoted_snippet: c.quoted_snippet.clone(),
                })
                .collect(),
        );

        let outcome = self.generator.generate(&request).await?;

        // Map cited ids back to retrieved chunks; the generator cannot cite
        // chunks it was not given, so unknown ids are silently dropped.
        let mut citations: Vec<Citation> = Vec::new();
        let mut dropped: Vec<DroppedCitation> = Vec::new();
        for id in &outcome.citation_chunk_ids {
            if citations.iter().any(|c| &c.chunk_id == id) {
                continue;
            }
            match retrieved.iter().find(|c| &c.chunk_id == id) {
                Some(chunk) => citations.push(Citation::from(chunk)),
                None => dropped.push(DroppedCitation {
                    chunk_id: id.clone(),
                    reason: "cited chunk not in retrieved set".to_string(),
                }),
            }
        }

        if let Some(trace) = trace.as_mut() {
            trace.dropped_citations = dropped;
        }

        if outcome.answer.contains(SENTINEL_ANSWER) {
            return Ok(attach(
                AnswerResult::not_specified("generator found no supportable answer", vec![]),
                trace,
            ));
        }

        if citations.is_empty() {
            return Ok(attach(
                AnswerResult::not_specified("generator cited no retrieved evidence", vec![]),
                trace,
            ));
        }

        let quoted: Vec<String> = citations.iter().map(|c| c.quoted_snippet.clone()).collect();
        let guard = apply_claim_check(
            &outcome.answer,
            &quoted,
            outcome.confidence,
            outcome.needs_review,
        );

        if let Some(trace) = trace.as_mut() {
            trace.unsupported_tokens = guard.unsupported_tokens.clone();
            trace.final_citation_ids = citations.iter().map(|c| c.chunk_id.clone()).collect();
        }

        if guard.answer == SENTINEL_ANSWER {
            // Evidence was found but rejected: the citations stay visible so
            // a reviewer can see what the rejected claims were checked
            // against.
            return Ok(attach(
                AnswerResult::not_specified(
                    format!(
                        "answer made claims not found in cited evidence: {}",
                        guard.unsupported_tokens.join(", ")
                    ),
                    citations,
                ),
                trace,
            ));
        }

        Ok(attach(
            AnswerResult {
                answer: guard.answer,
                citations,
                confidence: guard.confidence,
                needs_review: guard.needs_review,
                not_found_reason: None,
                debug: None,
            },
            trace,
        ))
    }
}

fn attach(mut result: AnswerResult, trace: Option<DebugTrace>) -> AnswerResult {
    result.debug = trace;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChunkHit, DocumentRecord, StoredChunk};
    use attest_core::AppError;
    use attest_llm::{Confidence, GenerationOutcome};

    /// Vector store stub with a fixed row set.
    struct StubStore {
        rows: Vec<ChunkHit>,
    }

    #[async_trait::async_trait]
    impl VectorStore for StubStore {
        async fn embedded_chunk_count(&self, _org_id: &str) -> AppResult<u64> {
            Ok(self.rows.len() as u64)
        }

        async fn vector_search(
            &self,
            _org_id: &str,
            _query: &[f32],
            limit: usize,
        ) -> AppResult<Vec<ChunkHit>> {
            Ok(self.rows.iter().take(limit).cloned().collect())
        }

        async fn find_document_by_hash(
            &self,
            _org_id: &str,
            _content_hash: &str,
        ) -> AppResult<Option<String>> {
            Ok(None)
        }

        async fn insert_document(&self, _doc: &DocumentRecord) -> AppResult<()> {
            unimplemented!("read-only stub")
        }

        async fn insert_chunk(&self, _chunk: &StoredChunk) -> AppResult<()> {
            unimplemented!("read-only stub")
        }
    }

    /// Embedder stub returning a constant vector.
    struct StubEmbedder {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EmbeddingClient for StubEmbedder {
        fn provider_name(&self) -> &str {
            "stub"
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            if self.fail {
                return Err(AppError::Collaborator("embedding unavailable".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    /// Generator stub returning a canned outcome.
    struct StubGenerator {
        outcome: GenerationOutcome,
    }

    #[async_trait::async_trait]
    impl GenerationClient for StubGenerator {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _request: &GenerationRequest) -> AppResult<GenerationOutcome> {
            Ok(self.outcome.clone())
        }
    }

    fn evidence_row() -> ChunkHit {
        ChunkHit {
            chunk_id: "c-1".to_string(),
            doc_name: "security.md".to_string(),
            content: "Data is encrypted at rest with AES-256.".to_string(),
            distance: 0.1,
        }
    }

    fn assembler(rows: Vec<ChunkHit>, outcome: GenerationOutcome, debug: bool) -> Assembler {
        Assembler::new(
            Arc::new(StubStore { rows }),
            Arc::new(StubEmbedder { fail: false }),
            Arc::new(StubGenerator { outcome }),
            AssemblerOptions {
                debug_enabled: debug,
                ..AssemblerOptions::default()
            },
        )
    }

    fn supported_outcome() -> GenerationOutcome {
        GenerationOutcome {
            answer: "Data is encrypted at rest with AES-256.".to_string(),
            citation_chunk_ids: vec!["c-1".to_string()],
            confidence: Confidence::High,
            needs_review: false,
        }
    }

    #[tokio::test]
    async fn test_no_documents_short_circuits() {
        let asm = assembler(vec![], supported_outcome(), false);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        assert!(result.is_not_found());
        assert!(result.citations.is_empty());
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.needs_review);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let asm = Assembler::new(
            Arc::new(StubStore {
                rows: vec![evidence_row()],
            }),
            Arc::new(StubEmbedder { fail: true }),
            Arc::new(StubGenerator {
                outcome: supported_outcome(),
            }),
            AssemblerOptions::default(),
        );

        let err = asm.answer_question("org-1", "Is data encrypted?").await;
        assert!(matches!(err, Err(AppError::Collaborator(_))));
    }

    #[tokio::test]
    async fn test_weak_evidence_returns_sentinel() {
        let mut row = evidence_row();
        row.distance = 0.9; // similarity 0.1, below the 0.35 gate

        let asm = assembler(vec![row], supported_outcome(), false);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        assert!(result.is_not_found());
        assert!(result.not_found_reason.as_deref().unwrap().contains("similar"));
    }

    #[tokio::test]
    async fn test_supported_answer_flows_through() {
        let asm = assembler(vec![evidence_row()], supported_outcome(), false);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        assert_eq!(result.answer, "Data is encrypted at rest with AES-256.");
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].chunk_id, "c-1");
        assert_eq!(result.confidence, Confidence::High);
        assert!(!result.needs_review);
        assert!(result.not_found_reason.is_none());
    }

    #[tokio::test]
    async fn test_unknown_citations_dropped_to_sentinel() {
        let outcome = GenerationOutcome {
            citation_chunk_ids: vec!["ghost".to_string()],
            ..supported_outcome()
        };

        let asm = assembler(vec![evidence_row()], outcome, true);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        assert!(result.is_not_found());
        assert!(result.citations.is_empty());

        let trace = result.debug.unwrap();
        assert_eq!(trace.dropped_citations.len(), 1);
        assert_eq!(trace.dropped_citations[0].chunk_id, "ghost");
    }

    #[tokio::test]
    async fn test_guardrail_rewrite_keeps_citations() {
        let outcome = GenerationOutcome {
            answer: "Data is encrypted with AWS KMS.".to_string(),
            ..supported_outcome()
        };

        let asm = assembler(vec![evidence_row()], outcome, true);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        assert!(result.is_not_found());
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.needs_review);

        let trace = result.debug.unwrap();
        assert!(trace.unsupported_tokens.contains(&"aws".to_string()));
        assert!(trace.unsupported_tokens.contains(&"kms".to_string()));
    }

    #[tokio::test]
    async fn test_generator_sentinel_is_passed_on() {
        let outcome = GenerationOutcome {
            answer: SENTINEL_ANSWER.to_string(),
            ..supported_outcome()
        };

        let asm = assembler(vec![evidence_row()], outcome, false);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        assert!(result.is_not_found());
        assert!(result.citations.is_empty());
    }

    #[tokio::test]
    async fn test_debug_trace_records_retrieval() {
        let asm = assembler(vec![evidence_row()], supported_outcome(), true);
        let result = asm.answer_question("org-1", "Is data encrypted?").await.unwrap();

        let trace = result.debug.unwrap();
        assert_eq!(trace.retrieved.len(), 1);
        assert_eq!(trace.retrieved[0].chunk_id, "c-1");
        assert_eq!(trace.post_filter_chunk_ids, vec!["c-1".to_string()]);
        assert_eq!(trace.final_citation_ids, vec!["c-1".to_string()]);
    }
}
