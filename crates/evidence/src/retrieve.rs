//! Similarity-ranked chunk retrieval.
//!
//! Turns raw nearest-neighbor rows from the store into ranked, deduplicated
//! [`RetrievedChunk`] records with anchored snippets. The store's ordering is
//! advisory only; results are re-sorted here so equal-similarity ties break
//! deterministically regardless of what order storage returns rows.

use crate::anchors::anchor_tokens;
use crate::snippet::select_snippet;
use crate::store::VectorStore;
use crate::types::RetrievedChunk;
use attest_core::AppResult;
use std::collections::HashMap;

/// Retrieve the top-k most similar chunks for a question.
///
/// Output is sorted by similarity descending, ties broken by chunk id
/// ascending. Similarity is `max(0, 1 - distance)`, clamped non-negative
/// even when the raw cosine distance exceeds 1.
pub async fn retrieve_top_chunks(
    store: &dyn VectorStore,
    org_id: &str,
    question_embedding: &[f32],
    question_text: &str,
    top_k: usize,
    snippet_chars: usize,
) -> AppResult<Vec<RetrievedChunk>> {
    let rows = store.vector_search(org_id, question_embedding, top_k).await?;
    let anchors = anchor_tokens(question_text);

    let mut by_id: HashMap<String, RetrievedChunk> = HashMap::new();
    for row in rows {
        let similarity = (1.0 - row.distance).max(0.0);

        let keep = by_id
            .get(&row.chunk_id)
            .map_or(true, |existing| similarity > existing.similarity);
        if !keep {
            continue;
        }

        let quoted_snippet = select_snippet(&row.content, &anchors, snippet_chars);
        by_id.insert(
            row.chunk_id.clone(),
            RetrievedChunk {
                chunk_id: row.chunk_id,
                doc_name: row.doc_name,
                quoted_snippet,
                full_content: row.content,
                similarity,
            },
        );
    }

    let mut results: Vec<RetrievedChunk> = by_id.into_values().collect();
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    tracing::debug!(
        "Retrieved {} chunks for org '{}' (requested top-{})",
        results.len(),
        org_id,
        top_k
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChunkHit, DocumentRecord, StoredChunk};

    /// Store stub that returns canned vector-search rows.
    struct FixedStore {
        rows: Vec<ChunkHit>,
    }

    #[async_trait::async_trait]
    impl VectorStore for FixedStore {
        async fn embedded_chunk_count(&self, _org_id: &str) -> AppResult<u64> {
            Ok(self.rows.len() as u64)
        }

        async fn vector_search(
            &self,
            _org_id: &str,
            _query: &[f32],
            _limit: usize,
        ) -> AppResult<Vec<ChunkHit>> {
            Ok(self.rows.clone())
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

    fn hit(chunk_id: &str, distance: f32) -> ChunkHit {
        ChunkHit {
            chunk_id: chunk_id.to_string(),
            doc_name: "policy.md".to_string(),
            content: "Data is encrypted at rest.".to_string(),
            distance,
        }
    }

    #[tokio::test]
    async fn test_results_sorted_by_similarity_then_id() {
        // Rows arrive in a scrambled order on purpose.
        let store = FixedStore {
            rows: vec![hit("c", 0.4), hit("b", 0.1), hit("a", 0.1), hit("d", 0.7)],
        };

        let results = retrieve_top_chunks(&store, "org-1", &[1.0], "Is data encrypted?", 5, 200)
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert!((results[0].similarity - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_similarity_clamped_non_negative() {
        let store = FixedStore {
            rows: vec![hit("far", 1.8)],
        };

        let results = retrieve_top_chunks(&store, "org-1", &[1.0], "anything", 5, 200)
            .await
            .unwrap();

        assert_eq!(results[0].similarity, 0.0);
    }

    #[tokio::test]
    async fn test_duplicate_chunk_ids_deduplicated() {
        let store = FixedStore {
            rows: vec![hit("a", 0.5), hit("a", 0.2)],
        };

        let results = retrieve_top_chunks(&store, "org-1", &[1.0], "anything", 5, 200)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!((results[0].similarity - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_snippets_are_anchored() {
        let store = FixedStore {
            rows: vec![ChunkHit {
                chunk_id: "a".to_string(),
                doc_name: "policy.md".to_string(),
                content: "## Encryption\nData is encrypted at rest with AES-256.\n\n## Other\nUnrelated text.".to_string(),
                distance: 0.1,
            }],
        };

        let results =
            retrieve_top_chunks(&store, "org-1", &[1.0], "Describe your encryption", 5, 200)
                .await
                .unwrap();

        assert!(results[0].quoted_snippet.contains("AES-256"));
    }
}
