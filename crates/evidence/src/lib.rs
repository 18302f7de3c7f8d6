//! Evidence-grounded questionnaire answering.
//!
//! This crate is the core pipeline: deterministic chunking of evidence
//! documents, similarity-ranked retrieval with anchored snippets, a lexical
//! claim-check guardrail, the grounded answer assembler, and the autofill
//! state machine that drives answering across a questionnaire.

pub mod anchors;
pub mod answer;
pub mod autofill;
pub mod chunker;
pub mod guardrail;
pub mod index;
pub mod retrieve;
pub mod snippet;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the exposed operations and commonly used types
pub use answer::{Assembler, AssemblerOptions};
pub use autofill::{
    process_batch, process_rerun_missing_batch, run_status, BatchOptions, NoopPacer, Pacer,
    TokioPacer, DEFAULT_BATCH_SIZE,
};
pub use chunker::chunk_text;
pub use guardrail::{apply_claim_check, GuardrailOutcome};
pub use index::SqliteStore;
pub use retrieve::retrieve_top_chunks;
pub use snippet::select_snippet;
pub use store::{
    AnswerUpdate, ChunkHit, DocumentRecord, EvidenceStore, QuestionCounts, QuestionnaireStore,
    StoredChunk, VectorStore,
};
pub use types::{
    AnswerResult, Chunk, Citation, DebugTrace, QuestionRow, QuestionnaireRow, RetrievedChunk,
    RunProgress, RunStatus, SENTINEL_ANSWER,
};

use attest_core::{AppError, AppResult};
use attest_llm::EmbeddingClient;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

/// Options for document ingestion.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Maximum characters per chunk
    pub max_chunk_chars: usize,

    /// Overlap between consecutive chunks, in characters
    pub overlap_chars: usize,

    /// Path substrings that must match (empty means everything)
    pub include: Vec<String>,

    /// Path substrings that exclude a file
    pub exclude: Vec<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1800,
            overlap_chars: 200,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Documents ingested
    pub documents: u32,

    /// Chunks embedded and stored
    pub chunks: u32,

    /// Bytes of text processed
    pub bytes: u64,

    /// Files skipped (unchanged content or unreadable)
    pub skipped: u32,
}

/// Ingest a file or directory of evidence documents for an organization.
pub async fn ingest_path(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingClient,
    org_id: &str,
    path: &Path,
    options: &IngestOptions,
) -> AppResult<IngestStats> {
    tracing::info!("Ingesting {:?} for org '{}'", path, org_id);

    let mut stats = IngestStats::default();

    if path.is_file() {
        ingest_file(store, embedder, org_id, path, options, &mut stats).await?;
    } else if path.is_dir() {
        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if entry_path.is_file() && should_include(entry_path, options) {
                ingest_file(store, embedder, org_id, entry_path, options, &mut stats).await?;
            }
        }
    } else {
        return Err(AppError::NotFound(format!("no such path: {:?}", path)));
    }

    tracing::info!(
        "Ingest finished: {} document(s), {} chunk(s), {} byte(s), {} skipped",
        stats.documents,
        stats.chunks,
        stats.bytes,
        stats.skipped
    );

    Ok(stats)
}

/// Ingest one document's text under the given name.
///
/// Returns the number of chunks stored, or `None` when a document with
/// identical content is already ingested for this organization.
pub async fn ingest_text(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingClient,
    org_id: &str,
    doc_name: &str,
    text: &str,
    options: &IngestOptions,
) -> AppResult<Option<u32>> {
    let content_hash = format!("{:x}", Sha256::digest(text.as_bytes()));

    if let Some(existing) = store.find_document_by_hash(org_id, &content_hash).await? {
        tracing::debug!(
            "Skipping '{}': identical content already ingested as document {}",
            doc_name,
            existing
        );
        return Ok(None);
    }

    let chunks = chunker::chunk_text(text, options.max_chunk_chars, options.overlap_chars)?;

    let document_id = uuid::Uuid::new_v4().to_string();
    store
        .insert_document(&DocumentRecord {
            id: document_id.clone(),
            org_id: org_id.to_string(),
            name: doc_name.to_string(),
            content_hash,
            ingested_at: Utc::now(),
        })
        .await?;

    if chunks.is_empty() {
        tracing::warn!("Document '{}' produced no chunks", doc_name);
        return Ok(Some(0));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    if embeddings.len() != chunks.len() {
        return Err(AppError::Collaborator(format!(
            "Embedding count mismatch: {} chunks, {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }

    let mut stored = 0u32;
    for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
        store
            .insert_chunk(&StoredChunk {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: document_id.clone(),
                index: chunk.index,
                content: chunk.content,
                embedding,
            })
            .await?;
        stored += 1;
    }

    tracing::debug!("Ingested '{}': {} chunk(s)", doc_name, stored);
    Ok(Some(stored))
}

async fn ingest_file(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingClient,
    org_id: &str,
    path: &Path,
    options: &IngestOptions,
    stats: &mut IngestStats,
) -> AppResult<()> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
            stats.skipped += 1;
            return Ok(());
        }
    };

    let doc_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    match ingest_text(store, embedder, org_id, &doc_name, &text, options).await? {
        Some(chunks) => {
            stats.documents += 1;
            stats.chunks += chunks;
            stats.bytes += text.len() as u64;
        }
        None => stats.skipped += 1,
    }

    Ok(())
}

/// Check if a file should be included based on substring patterns.
fn should_include(path: &Path, options: &IngestOptions) -> bool {
    let path_str = path.to_string_lossy();

    for pattern in &options.exclude {
        if path_str.contains(pattern) {
            return false;
        }
    }

    if !options.include.is_empty() {
        return options.include.iter().any(|p| path_str.contains(p));
    }

    true
}

/// Create a questionnaire from its question texts, rows indexed in order.
///
/// Every row starts unanswered and the run starts `PENDING`.
pub async fn import_questionnaire(
    store: &dyn QuestionnaireStore,
    org_id: &str,
    name: &str,
    questions: &[String],
) -> AppResult<QuestionnaireRow> {
    if questions.is_empty() {
        return Err(AppError::Config(
            "questionnaire must contain at least one question".to_string(),
        ));
    }

    let row = QuestionnaireRow {
        id: uuid::Uuid::new_v4().to_string(),
        org_id: org_id.to_string(),
        name: name.to_string(),
        archived: false,
        status: RunStatus::Pending,
        last_error: None,
        started_at: None,
        finished_at: None,
    };

    store.insert_questionnaire(&row).await?;

    for (i, text) in questions.iter().enumerate() {
        store
            .insert_question(&QuestionRow {
                questionnaire_id: row.id.clone(),
                row_index: i as u32,
                text: text.clone(),
                answer: None,
                citations: Vec::new(),
                confidence: None,
                needs_review: false,
                not_found_reason: None,
                last_rerun_at: None,
            })
            .await?;
    }

    tracing::info!(
        "Imported questionnaire '{}' ({}) with {} question(s)",
        name,
        row.id,
        questions.len()
    );

    Ok(row)
}
