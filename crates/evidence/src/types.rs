//! Evidence pipeline type definitions.

use attest_llm::Confidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed answer signaling that no supportable answer was found.
///
/// This is a stable contract value: callers compare against it by exact or
/// substring match, so it must not change without a version bump.
pub const SENTINEL_ANSWER: &str = "Not specified in provided documents.";

/// A bounded, overlapping slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position within the parent document, contiguous with no gaps
    pub index: u32,

    /// Trimmed, non-empty chunk text
    pub content: String,
}

/// A chunk returned from a similarity query, ready for generation.
///
/// Ephemeral: computed per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    /// Stored chunk identifier
    pub chunk_id: String,

    /// Name of the source document
    pub doc_name: String,

    /// Bounded quotation extracted around the question's anchor tokens
    pub quoted_snippet: String,

    /// Full chunk text
    pub full_content: String,

    /// `max(0, 1 - distance)` where distance is cosine distance in [0, 2]
    pub similarity: f32,
}

/// Evidence actually used to justify an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Name of the source document
    pub doc_name: String,

    /// Stored chunk identifier
    pub chunk_id: String,

    /// The quoted snippet backing the answer
    pub quoted_snippet: String,
}

impl From<&RetrievedChunk> for Citation {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            doc_name: chunk.doc_name.clone(),
            chunk_id: chunk.chunk_id.clone(),
            quoted_snippet: chunk.quoted_snippet.clone(),
        }
    }
}

/// Result of answering a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    /// Final answer text (possibly the sentinel)
    pub answer: String,

    /// Citations retained after mapping and guardrails
    pub citations: Vec<Citation>,

    /// Final confidence level
    pub confidence: Confidence,

    /// Whether a human should review this answer
    pub needs_review: bool,

    /// Why no answer was produced, when the answer is the sentinel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found_reason: Option<String>,

    /// Inspection trace, attached only when debug is requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

impl AnswerResult {
    /// Build a sentinel result.
    ///
    /// Citations may be non-empty when evidence was found but rejected;
    /// confidence is always low and review is always required.
    pub fn not_specified(reason: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            answer: SENTINEL_ANSWER.to_string(),
            citations,
            confidence: Confidence::Low,
            needs_review: true,
            not_found_reason: Some(reason.into()),
            debug: None,
        }
    }

    /// Whether this result is the sentinel.
    pub fn is_not_found(&self) -> bool {
        self.answer == SENTINEL_ANSWER
    }
}

/// Inspection trace for a single answering call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTrace {
    /// Retrieved top-k, in ranked order
    pub retrieved: Vec<RetrievedSummary>,

    /// Chunk ids surviving the sufficiency gate
    pub post_filter_chunk_ids: Vec<String>,

    /// Citations the generator claimed but the pipeline dropped
    pub dropped_citations: Vec<DroppedCitation>,

    /// Chunk ids of the final citations
    pub final_citation_ids: Vec<String>,

    /// Answer tokens the guardrail could not find in the cited evidence
    pub unsupported_tokens: Vec<String>,
}

/// Compact view of one retrieved chunk for the debug trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedSummary {
    pub chunk_id: String,
    pub doc_name: String,
    pub similarity: f32,
}

/// A generator citation that was not retained, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedCitation {
    pub chunk_id: String,
    pub reason: String,
}

/// Lifecycle state of a questionnaire's batch processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Get the canonical wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A questionnaire row with its run lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireRow {
    /// Questionnaire identifier
    pub id: String,

    /// Owning organization
    pub org_id: String,

    /// Display name
    pub name: String,

    /// Archived questionnaires are invisible to batch processing
    pub archived: bool,

    /// Current run status
    pub status: RunStatus,

    /// Message of the last unrecovered batch error
    pub last_error: Option<String>,

    /// When the current run started (preserved across resumes)
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed
    pub finished_at: Option<DateTime<Utc>>,
}

/// A single questionnaire question with its answer state.
///
/// `answer == None` means unprocessed. Rows are mutated only by the autofill
/// state machine, one question at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRow {
    /// Owning questionnaire
    pub questionnaire_id: String,

    /// Zero-based row position, the processing order
    pub row_index: u32,

    /// Question text
    pub text: String,

    /// Persisted answer, possibly the sentinel
    pub answer: Option<String>,

    /// Citations backing the answer
    pub citations: Vec<Citation>,

    /// Confidence of the persisted answer
    pub confidence: Option<Confidence>,

    /// Whether the answer is flagged for review
    pub needs_review: bool,

    /// Why no answer was produced, when the answer is the sentinel
    pub not_found_reason: Option<String>,

    /// When a rerun-missing pass last touched this row
    pub last_rerun_at: Option<DateTime<Utc>>,
}

/// Progress snapshot returned by the autofill batch operations.
///
/// Counts are derived from current row state, never incremented in place:
/// `processed` counts rows with a non-null answer, `not_found` counts rows
/// whose answer equals the sentinel, and `found = processed - not_found`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub status: RunStatus,
    pub total_count: u32,
    pub processed_count: u32,
    pub found_count: u32,
    pub not_found_count: u32,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
