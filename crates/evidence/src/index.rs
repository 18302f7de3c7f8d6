//! SQLite-backed evidence and questionnaire store.
//!
//! Implements both store traits over a single rusqlite connection. The
//! connection is serialized behind a tokio mutex; every method locks, does
//! its synchronous SQL work, and releases before any await point.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so string
//! comparison in SQL matches chronological order. Embeddings are stored as
//! little-endian f32 BLOBs.

use crate::store::{
    AnswerUpdate, ChunkHit, DocumentRecord, QuestionCounts, QuestionnaireStore, StoredChunk,
    VectorStore,
};
use crate::types::{Citation, QuestionRow, QuestionnaireRow, RunStatus, SENTINEL_ANSWER};
use attest_core::{AppError, AppResult};
use attest_llm::Confidence;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tokio::sync::Mutex;

/// SQLite store for documents, chunks, questionnaires, and questions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite store: {}", e)))?;

        Self::init_schema(&conn)?;
        tracing::debug!("Opened evidence store at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (testing and dry runs).
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open in-memory store: {}", e)))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> AppResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                ingested_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            );

            CREATE TABLE IF NOT EXISTS questionnaires (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                last_error TEXT,
                started_at TEXT,
                finished_at TEXT
            );

            CREATE TABLE IF NOT EXISTS questions (
                questionnaire_id TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                answer TEXT,
                citations TEXT NOT NULL DEFAULT '[]',
                confidence TEXT,
                needs_review INTEGER NOT NULL DEFAULT 0,
                not_found_reason TEXT,
                last_rerun_at TEXT,
                debug TEXT,
                PRIMARY KEY (questionnaire_id, row_index),
                FOREIGN KEY (questionnaire_id) REFERENCES questionnaires(id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_org ON documents(org_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }
}

/// Serialize a timestamp to a fixed-width RFC 3339 UTC string.
fn to_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an optional stored timestamp.
fn parse_ts(value: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| AppError::Storage(format!("Invalid stored timestamp '{}': {}", s, e))),
    }
}

/// Convert an embedding vector to little-endian bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert stored bytes back to an embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Storage(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    let mut embedding = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        embedding.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(embedding)
}

/// Cosine distance in [0, 2]; orthogonal or zero vectors give 1.0.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 1.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

fn parse_status(s: &str) -> AppResult<RunStatus> {
    RunStatus::parse(s)
        .ok_or_else(|| AppError::Storage(format!("Invalid stored run status '{}'", s)))
}

fn parse_citations(json: &str) -> AppResult<Vec<Citation>> {
    serde_json::from_str(json)
        .map_err(|e| AppError::Storage(format!("Invalid stored citations: {}", e)))
}

fn parse_confidence(value: Option<String>) -> Option<Confidence> {
    value.as_deref().and_then(Confidence::parse)
}

/// Raw question row as read from SQLite, before type conversion.
struct RawQuestion {
    questionnaire_id: String,
    row_index: i64,
    text: String,
    answer: Option<String>,
    citations: String,
    confidence: Option<String>,
    needs_review: i64,
    not_found_reason: Option<String>,
    last_rerun_at: Option<String>,
}

impl RawQuestion {
    fn into_row(self) -> AppResult<QuestionRow> {
        Ok(QuestionRow {
            questionnaire_id: self.questionnaire_id,
            row_index: self.row_index as u32,
            text: self.text,
            answer: self.answer,
            citations: parse_citations(&self.citations)?,
            confidence: parse_confidence(self.confidence),
            needs_review: self.needs_review != 0,
            not_found_reason: self.not_found_reason,
            last_rerun_at: parse_ts(self.last_rerun_at)?,
        })
    }
}

const QUESTION_COLUMNS: &str = "questionnaire_id, row_index, text, answer, citations, \
                                confidence, needs_review, not_found_reason, last_rerun_at";

fn read_raw_question(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawQuestion> {
    Ok(RawQuestion {
        questionnaire_id: row.get(0)?,
        row_index: row.get(1)?,
        text: row.get(2)?,
        answer: row.get(3)?,
        citations: row.get(4)?,
        confidence: row.get(5)?,
        needs_review: row.get(6)?,
        not_found_reason: row.get(7)?,
        last_rerun_at: row.get(8)?,
    })
}

#[async_trait::async_trait]
impl VectorStore for SqliteStore {
    async fn embedded_chunk_count(&self, org_id: &str) -> AppResult<u64> {
        let conn = self.conn.lock().await;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks c
                 JOIN documents d ON c.document_id = d.id
                 WHERE d.org_id = ?1",
                params![org_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Storage(format!("Failed to count chunks: {}", e)))?;

        Ok(count as u64)
    }

    async fn vector_search(
        &self,
        org_id: &str,
        query: &[f32],
        limit: usize,
    ) -> AppResult<Vec<ChunkHit>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn
            .prepare(
                "SELECT c.id, d.name, c.content, c.embedding FROM chunks c
                 JOIN documents d ON c.document_id = d.id
                 WHERE d.org_id = ?1",
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare search: {}", e)))?;

        let raw: Vec<(String, String, String, Vec<u8>)> = stmt
            .query_map(params![org_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .map_err(|e| AppError::Storage(format!("Failed to query chunks: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Storage(format!("Failed to read chunk row: {}", e)))?;

        let mut hits = Vec::with_capacity(raw.len());
        for (chunk_id, doc_name, content, embedding_bytes) in raw {
            let embedding = bytes_to_embedding(&embedding_bytes)?;
            hits.push(ChunkHit {
                chunk_id,
                doc_name,
                content,
                distance: cosine_distance(query, &embedding),
            });
        }

        // Ascending distance, ties broken by chunk id ascending.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn find_document_by_hash(
        &self,
        org_id: &str,
        content_hash: &str,
    ) -> AppResult<Option<String>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn
            .prepare("SELECT id FROM documents WHERE org_id = ?1 AND content_hash = ?2 LIMIT 1")
            .map_err(|e| AppError::Storage(format!("Failed to prepare lookup: {}", e)))?;

        let mut rows = stmt
            .query_map(params![org_id, content_hash], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Storage(format!("Failed to query documents: {}", e)))?;

        match rows.next() {
            None => Ok(None),
            Some(Ok(id)) => Ok(Some(id)),
            Some(Err(e)) => Err(AppError::Storage(format!(
                "Failed to read document row: {}",
                e
            ))),
        }
    }

    async fn insert_document(&self, doc: &DocumentRecord) -> AppResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT OR REPLACE INTO documents (id, org_id, name, content_hash, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doc.id,
                doc.org_id,
                doc.name,
                doc.content_hash,
                to_ts(doc.ingested_at),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert document: {}", e)))?;

        Ok(())
    }

    async fn insert_chunk(&self, chunk: &StoredChunk) -> AppResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT OR REPLACE INTO chunks (id, document_id, chunk_index, content, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chunk.id,
                chunk.document_id,
                chunk.index as i64,
                chunk.content,
                embedding_to_bytes(&chunk.embedding),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert chunk: {}", e)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl QuestionnaireStore for SqliteStore {
    async fn insert_questionnaire(&self, row: &QuestionnaireRow) -> AppResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT INTO questionnaires (id, org_id, name, archived, status, last_error, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id,
                row.org_id,
                row.name,
                row.archived as i64,
                row.status.as_str(),
                row.last_error,
                row.started_at.map(to_ts),
                row.finished_at.map(to_ts),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert questionnaire: {}", e)))?;

        Ok(())
    }

    async fn insert_question(&self, row: &QuestionRow) -> AppResult<()> {
        let conn = self.conn.lock().await;

        let citations = serde_json::to_string(&row.citations)
            .map_err(|e| AppError::Storage(format!("Failed to serialize citations: {}", e)))?;

        conn.execute(
            "INSERT INTO questions (questionnaire_id, row_index, text, answer, citations,
                                    confidence, needs_review, not_found_reason, last_rerun_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.questionnaire_id,
                row.row_index as i64,
                row.text,
                row.answer,
                citations,
                row.confidence.map(|c| c.as_str()),
                row.needs_review as i64,
                row.not_found_reason,
                row.last_rerun_at.map(to_ts),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to insert question: {}", e)))?;

        Ok(())
    }

    async fn get_questionnaire(
        &self,
        org_id: &str,
        questionnaire_id: &str,
    ) -> AppResult<Option<QuestionnaireRow>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn
            .prepare(
                "SELECT id, org_id, name, archived, status, last_error, started_at, finished_at
                 FROM questionnaires WHERE id = ?1 AND org_id = ?2",
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare lookup: {}", e)))?;

        type RawQuestionnaire = (
            String,
            String,
            String,
            i64,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
        );

        let mut rows = stmt
            .query_map(params![questionnaire_id, org_id], |row| {
                Ok::<RawQuestionnaire, _>((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to query questionnaire: {}", e)))?;

        match rows.next() {
            None => Ok(None),
            Some(Err(e)) => Err(AppError::Storage(format!(
                "Failed to read questionnaire row: {}",
                e
            ))),
            Some(Ok((id, org, name, archived, status, last_error, started_at, finished_at))) => {
                Ok(Some(QuestionnaireRow {
                    id,
                    org_id: org,
                    name,
                    archived: archived != 0,
                    status: parse_status(&status)?,
                    last_error,
                    started_at: parse_ts(started_at)?,
                    finished_at: parse_ts(finished_at)?,
                }))
            }
        }
    }

    async fn save_run_state(&self, run: &QuestionnaireRow) -> AppResult<()> {
        let conn = self.conn.lock().await;

        let changed = conn
            .execute(
                "UPDATE questionnaires
                 SET status = ?2, last_error = ?3, started_at = ?4, finished_at = ?5
                 WHERE id = ?1",
                params![
                    run.id,
                    run.status.as_str(),
                    run.last_error,
                    run.started_at.map(to_ts),
                    run.finished_at.map(to_ts),
                ],
            )
            .map_err(|e| AppError::Storage(format!("Failed to save run state: {}", e)))?;

        if changed == 0 {
            return Err(AppError::NotFound(format!(
                "questionnaire '{}' not found",
                run.id
            )));
        }

        Ok(())
    }

    async fn unanswered_questions(
        &self,
        questionnaire_id: &str,
        limit: usize,
    ) -> AppResult<Vec<QuestionRow>> {
        let conn = self.conn.lock().await;

        let sql = format!(
            "SELECT {} FROM questions
             WHERE questionnaire_id = ?1 AND answer IS NULL
             ORDER BY row_index ASC LIMIT ?2",
            QUESTION_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Storage(format!("Failed to prepare selection: {}", e)))?;

        let raw: Vec<RawQuestion> = stmt
            .query_map(params![questionnaire_id, limit as i64], read_raw_question)
            .map_err(|e| AppError::Storage(format!("Failed to query questions: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Storage(format!("Failed to read question row: {}", e)))?;

        raw.into_iter().map(RawQuestion::into_row).collect()
    }

    async fn rerun_eligible_questions(
        &self,
        questionnaire_id: &str,
        run_started_at: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<QuestionRow>> {
        let conn = self.conn.lock().await;

        let sql = format!(
            "SELECT {} FROM questions
             WHERE questionnaire_id = ?1
               AND (answer IS NULL OR answer = ?2)
               AND (last_rerun_at IS NULL OR last_rerun_at < ?3)
             ORDER BY row_index ASC LIMIT ?4",
            QUESTION_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Storage(format!("Failed to prepare selection: {}", e)))?;

        let raw: Vec<RawQuestion> = stmt
            .query_map(
                params![
                    questionnaire_id,
                    SENTINEL_ANSWER,
                    to_ts(run_started_at),
                    limit as i64
                ],
                read_raw_question,
            )
            .map_err(|e| AppError::Storage(format!("Failed to query questions: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Storage(format!("Failed to read question row: {}", e)))?;

        raw.into_iter().map(RawQuestion::into_row).collect()
    }

    async fn save_answer(
        &self,
        questionnaire_id: &str,
        row_index: u32,
        update: &AnswerUpdate,
    ) -> AppResult<()> {
        let conn = self.conn.lock().await;

        let citations = serde_json::to_string(&update.citations)
            .map_err(|e| AppError::Storage(format!("Failed to serialize citations: {}", e)))?;

        let debug = match &update.debug {
            None => None,
            Some(trace) => Some(serde_json::to_string(trace).map_err(|e| {
                AppError::Storage(format!("Failed to serialize debug trace: {}", e))
            })?),
        };

        let changed = conn
            .execute(
                "UPDATE questions
                 SET answer = ?3, citations = ?4, confidence = ?5, needs_review = ?6,
                     not_found_reason = ?7, debug = ?8
                 WHERE questionnaire_id = ?1 AND row_index = ?2",
                params![
                    questionnaire_id,
                    row_index as i64,
                    update.answer,
                    citations,
                    update.confidence.as_str(),
                    update.needs_review as i64,
                    update.not_found_reason,
                    debug,
                ],
            )
            .map_err(|e| AppError::Storage(format!("Failed to save answer: {}", e)))?;

        if changed == 0 {
            return Err(AppError::NotFound(format!(
                "question row {} of questionnaire '{}' not found",
                row_index, questionnaire_id
            )));
        }

        Ok(())
    }

    async fn stamp_rerun(
        &self,
        questionnaire_id: &str,
        row_index: u32,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "UPDATE questions SET last_rerun_at = ?3
             WHERE questionnaire_id = ?1 AND row_index = ?2",
            params![questionnaire_id, row_index as i64, to_ts(at)],
        )
        .map_err(|e| AppError::Storage(format!("Failed to stamp rerun: {}", e)))?;

        Ok(())
    }

    async fn question_counts(&self, questionnaire_id: &str) -> AppResult<QuestionCounts> {
        let conn = self.conn.lock().await;

        conn.query_row(
            "SELECT COUNT(*),
                    COUNT(answer),
                    SUM(CASE WHEN answer = ?2 THEN 1 ELSE 0 END)
             FROM questions WHERE questionnaire_id = ?1",
            params![questionnaire_id, SENTINEL_ANSWER],
            |row| {
                Ok(QuestionCounts {
                    total: row.get::<_, i64>(0)? as u32,
                    processed: row.get::<_, i64>(1)? as u32,
                    not_found: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u32,
                })
            },
        )
        .map_err(|e| AppError::Storage(format!("Failed to compute counts: {}", e)))
    }

    async fn get_question(
        &self,
        questionnaire_id: &str,
        row_index: u32,
    ) -> AppResult<Option<QuestionRow>> {
        let conn = self.conn.lock().await;

        let sql = format!(
            "SELECT {} FROM questions WHERE questionnaire_id = ?1 AND row_index = ?2",
            QUESTION_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Storage(format!("Failed to prepare lookup: {}", e)))?;

        let mut rows = stmt
            .query_map(params![questionnaire_id, row_index as i64], read_raw_question)
            .map_err(|e| AppError::Storage(format!("Failed to query question: {}", e)))?;

        match rows.next() {
            None => Ok(None),
            Some(Err(e)) => Err(AppError::Storage(format!(
                "Failed to read question row: {}",
                e
            ))),
            Some(Ok(raw)) => Ok(Some(raw.into_row()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(v: &[f32]) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter().map(|x| x / norm).collect()
        } else {
            v.to_vec()
        }
    }

    async fn seed_document(store: &SqliteStore, org_id: &str, doc_id: &str) {
        store
            .insert_document(&DocumentRecord {
                id: doc_id.to_string(),
                org_id: org_id.to_string(),
                name: format!("{}.md", doc_id),
                content_hash: format!("hash-{}", doc_id),
                ingested_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn seed_chunk(store: &SqliteStore, doc_id: &str, chunk_id: &str, embedding: Vec<f32>) {
        store
            .insert_chunk(&StoredChunk {
                id: chunk_id.to_string(),
                document_id: doc_id.to_string(),
                index: 0,
                content: format!("content of {}", chunk_id),
                embedding,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_creates_nested_store_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let db_path = temp.path().join(".attest").join("evidence.db");

        let store = SqliteStore::open(&db_path).unwrap();
        assert!(db_path.exists());

        seed_document(&store, "org-1", "doc-1").await;
        seed_chunk(&store, "doc-1", "c-1", vec![1.0, 0.0]).await;
        assert_eq!(store.embedded_chunk_count("org-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_distance_then_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed_document(&store, "org-1", "doc-1").await;

        seed_chunk(&store, "doc-1", "b", normalize(&[1.0, 0.0, 0.0])).await;
        seed_chunk(&store, "doc-1", "a", normalize(&[1.0, 0.0, 0.0])).await;
        seed_chunk(&store, "doc-1", "c", normalize(&[0.0, 1.0, 0.0])).await;

        let hits = store
            .vector_search("org-1", &normalize(&[1.0, 0.0, 0.0]), 10)
            .await
            .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(hits[0].distance < 0.001);
        assert!((hits[2].distance - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_vector_search_scoped_to_org() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed_document(&store, "org-1", "doc-1").await;
        seed_document(&store, "org-2", "doc-2").await;

        seed_chunk(&store, "doc-1", "mine", vec![1.0, 0.0]).await;
        seed_chunk(&store, "doc-2", "theirs", vec![1.0, 0.0]).await;

        let hits = store.vector_search("org-1", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "mine");

        assert_eq!(store.embedded_chunk_count("org-1").await.unwrap(), 1);
        assert_eq!(store.embedded_chunk_count("org-3").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_document_hash_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed_document(&store, "org-1", "doc-1").await;

        let found = store
            .find_document_by_hash("org-1", "hash-doc-1")
            .await
            .unwrap();
        assert_eq!(found, Some("doc-1".to_string()));

        let missing = store.find_document_by_hash("org-1", "other").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_question_counts_derived_from_rows() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .insert_questionnaire(&QuestionnaireRow {
                id: "q-1".to_string(),
                org_id: "org-1".to_string(),
                name: "vendor".to_string(),
                archived: false,
                status: RunStatus::Pending,
                last_error: None,
                started_at: None,
                finished_at: None,
            })
            .await
            .unwrap();

        for (i, answer) in [
            None,
            Some("Real answer".to_string()),
            Some(SENTINEL_ANSWER.to_string()),
        ]
        .into_iter()
        .enumerate()
        {
            store
                .insert_question(&QuestionRow {
                    questionnaire_id: "q-1".to_string(),
                    row_index: i as u32,
                    text: format!("question {}", i),
                    answer,
                    citations: vec![],
                    confidence: None,
                    needs_review: false,
                    not_found_reason: None,
                    last_rerun_at: None,
                })
                .await
                .unwrap();
        }

        let counts = store.question_counts("q-1").await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.processed, 2);
        assert_eq!(counts.not_found, 1);
        assert_eq!(counts.found(), 1);
    }

    #[tokio::test]
    async fn test_save_answer_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .insert_questionnaire(&QuestionnaireRow {
                id: "q-1".to_string(),
                org_id: "org-1".to_string(),
                name: "vendor".to_string(),
                archived: false,
                status: RunStatus::Pending,
                last_error: None,
                started_at: None,
                finished_at: None,
            })
            .await
            .unwrap();

        store
            .insert_question(&QuestionRow {
                questionnaire_id: "q-1".to_string(),
                row_index: 0,
                text: "Is data encrypted?".to_string(),
                answer: None,
                citations: vec![],
                confidence: None,
                needs_review: false,
                not_found_reason: None,
                last_rerun_at: None,
            })
            .await
            .unwrap();

        store
            .save_answer(
                "q-1",
                0,
                &AnswerUpdate {
                    answer: "Yes, with AES-256.".to_string(),
                    citations: vec![Citation {
                        doc_name: "policy.md".to_string(),
                        chunk_id: "c-1".to_string(),
                        quoted_snippet: "encrypted with AES-256".to_string(),
                    }],
                    confidence: Confidence::High,
                    needs_review: false,
                    not_found_reason: None,
                    debug: None,
                },
            )
            .await
            .unwrap();

        let row = store.get_question("q-1", 0).await.unwrap().unwrap();
        assert_eq!(row.answer.as_deref(), Some("Yes, with AES-256."));
        assert_eq!(row.citations.len(), 1);
        assert_eq!(row.citations[0].chunk_id, "c-1");
        assert_eq!(row.confidence, Some(Confidence::High));
        assert!(!row.needs_review);

        // Unknown rows surface as NotFound.
        let missing = store
            .save_answer(
                "q-1",
                99,
                &AnswerUpdate {
                    answer: "x".to_string(),
                    citations: vec![],
                    confidence: Confidence::Low,
                    needs_review: true,
                    not_found_reason: None,
                    debug: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rerun_eligibility_filter() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .insert_questionnaire(&QuestionnaireRow {
                id: "q-1".to_string(),
                org_id: "org-1".to_string(),
                name: "vendor".to_string(),
                archived: false,
                status: RunStatus::Pending,
                last_error: None,
                started_at: None,
                finished_at: None,
            })
            .await
            .unwrap();

        let run_started = Utc::now();
        let before = run_started - chrono::Duration::seconds(60);
        let after = run_started + chrono::Duration::seconds(60);

        // (answer, last_rerun_at, expected-eligible)
        let rows = [
            (None, None, true),
            (Some(SENTINEL_ANSWER.to_string()), Some(before), true),
            (Some(SENTINEL_ANSWER.to_string()), Some(after), false),
            (Some("Real answer".to_string()), None, false),
        ];

        for (i, (answer, stamped, _)) in rows.iter().enumerate() {
            store
                .insert_question(&QuestionRow {
                    questionnaire_id: "q-1".to_string(),
                    row_index: i as u32,
                    text: format!("question {}", i),
                    answer: answer.clone(),
                    citations: vec![],
                    confidence: None,
                    needs_review: false,
                    not_found_reason: None,
                    last_rerun_at: *stamped,
                })
                .await
                .unwrap();
        }

        let eligible = store
            .rerun_eligible_questions("q-1", run_started, 10)
            .await
            .unwrap();

        let indices: Vec<u32> = eligible.iter().map(|q| q.row_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
}
