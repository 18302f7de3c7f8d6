//! Storage collaborator traits and row shapes.
//!
//! The pipeline consumes persistence through two narrow async traits: one
//! for embedded evidence (documents, chunks, nearest-neighbor queries) and
//! one for questionnaire rows and run state. The SQLite implementation in
//! [`crate::index`] provides both; tests substitute small stubs.

use crate::types::{Citation, DebugTrace, QuestionRow, QuestionnaireRow};
use attest_core::AppResult;
use attest_llm::Confidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw row from a nearest-neighbor query.
///
/// `distance` is a cosine distance in `[0, 2]`; rows arrive ordered by
/// ascending distance with ties broken by chunk id ascending, but callers
/// must treat that ordering as advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHit {
    pub chunk_id: String,
    pub doc_name: String,
    pub content: String,
    pub distance: f32,
}

/// A document registered for an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

/// A chunk persisted with its embedding.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub document_id: String,
    pub index: u32,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Fields written back to a question row after answering.
#[derive(Debug, Clone)]
pub struct AnswerUpdate {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: Confidence,
    pub needs_review: bool,
    pub not_found_reason: Option<String>,
    /// Persisted only when debug persistence is enabled upstream
    pub debug: Option<DebugTrace>,
}

/// Row-state counts derived from persisted questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionCounts {
    /// All rows in the questionnaire
    pub total: u32,

    /// Rows with a non-null answer
    pub processed: u32,

    /// Rows whose answer equals the sentinel
    pub not_found: u32,
}

impl QuestionCounts {
    /// Rows answered with actual evidence.
    pub fn found(&self) -> u32 {
        self.processed.saturating_sub(self.not_found)
    }
}

/// Embedded-evidence side of the store.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Count embedded chunks available to an organization.
    async fn embedded_chunk_count(&self, org_id: &str) -> AppResult<u64>;

    /// Nearest-neighbor query by cosine distance, limited to `limit` rows.
    async fn vector_search(
        &self,
        org_id: &str,
        query: &[f32],
        limit: usize,
    ) -> AppResult<Vec<ChunkHit>>;

    /// Look up a document id by content hash, for re-ingest skip.
    async fn find_document_by_hash(
        &self,
        org_id: &str,
        content_hash: &str,
    ) -> AppResult<Option<String>>;

    /// Register a document.
    async fn insert_document(&self, doc: &DocumentRecord) -> AppResult<()>;

    /// Persist one embedded chunk.
    async fn insert_chunk(&self, chunk: &StoredChunk) -> AppResult<()>;
}

/// Questionnaire side of the store.
#[async_trait::async_trait]
pub trait QuestionnaireStore: Send + Sync {
    /// Create a questionnaire row.
    async fn insert_questionnaire(&self, row: &QuestionnaireRow) -> AppResult<()>;

    /// Create a question row.
    async fn insert_question(&self, row: &QuestionRow) -> AppResult<()>;

    /// Fetch a questionnaire scoped to its organization.
    async fn get_questionnaire(
        &self,
        org_id: &str,
        questionnaire_id: &str,
    ) -> AppResult<Option<QuestionnaireRow>>;

    /// Persist run lifecycle fields (status, error, timestamps).
    async fn save_run_state(&self, run: &QuestionnaireRow) -> AppResult<()>;

    /// Up to `limit` rows with no answer, ordered by row index ascending.
    async fn unanswered_questions(
        &self,
        questionnaire_id: &str,
        limit: usize,
    ) -> AppResult<Vec<QuestionRow>>;

    /// Up to `limit` rerun-eligible rows, ordered by row index ascending.
    ///
    /// Eligible means `(answer is null OR answer is the sentinel) AND
    /// (last_rerun_at is null OR last_rerun_at < run_started_at)`.
    async fn rerun_eligible_questions(
        &self,
        questionnaire_id: &str,
        run_started_at: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<QuestionRow>>;

    /// Persist one question's answer fields.
    async fn save_answer(
        &self,
        questionnaire_id: &str,
        row_index: u32,
        update: &AnswerUpdate,
    ) -> AppResult<()>;

    /// Stamp a row as touched by the current rerun pass.
    async fn stamp_rerun(
        &self,
        questionnaire_id: &str,
        row_index: u32,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Recompute row-state counts from current persisted state.
    async fn question_counts(&self, questionnaire_id: &str) -> AppResult<QuestionCounts>;

    /// Fetch a single question row.
    async fn get_question(
        &self,
        questionnaire_id: &str,
        row_index: u32,
    ) -> AppResult<Option<QuestionRow>>;
}

/// Convenience marker for stores providing both sides.
pub trait EvidenceStore: VectorStore + QuestionnaireStore {}

impl<T: VectorStore + QuestionnaireStore> EvidenceStore for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_count_is_derived() {
        let counts = QuestionCounts {
            total: 12,
            processed: 7,
            not_found: 3,
        };
        assert_eq!(counts.found(), 4);

        // Never underflows even on inconsistent inputs.
        let odd = QuestionCounts {
            total: 1,
            processed: 1,
            not_found: 2,
        };
        assert_eq!(odd.found(), 0);
    }
}
