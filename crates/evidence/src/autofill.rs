//! Questionnaire autofill state machine.
//!
//! Runs the assembler over batches of eligible questions, persisting each
//! answer immediately so partial progress survives a later failure. Run
//! status follows `PENDING → RUNNING → {COMPLETED | FAILED}`, with
//! `FAILED → RUNNING` on resume; `COMPLETED` and `FAILED` re-enter
//! `RUNNING` whenever new eligible rows exist.
//!
//! The design assumes at most one batch invocation per questionnaire in
//! flight at a time; concurrent invocations on the same questionnaire can
//! race on run status and counters. Guarding against that is a caller
//! responsibility.

use crate::answer::Assembler;
use crate::store::{AnswerUpdate, QuestionCounts, QuestionnaireStore};
use crate::types::{QuestionRow, QuestionnaireRow, RunProgress, RunStatus};
use attest_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Current time truncated to microseconds.
///
/// Run timestamps round-trip through storage at microsecond precision;
/// stamping them pre-truncated keeps in-memory values equal to what a
/// resumed call reads back.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now - chrono::Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos() % 1_000))
}

/// Default number of questions answered per batch call.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Injectable inter-question delay strategy.
///
/// Production uses a fixed tokio sleep as rate-limit courtesy to the
/// generation collaborator; tests inject the no-op pacer.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Fixed-delay pacer backed by the tokio timer.
pub struct TokioPacer {
    delay: Duration,
}

impl TokioPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

#[async_trait::async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// Zero-delay pacer for tests.
pub struct NoopPacer;

#[async_trait::async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self) {}
}

/// Batch behavior options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Questions answered per call
    pub batch_size: usize,

    /// Write debug traces to answered rows
    pub persist_debug: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            persist_debug: false,
        }
    }
}

/// Which rows a batch call is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchMode {
    /// Rows with no answer yet
    Unanswered,

    /// Unanswered or sentinel-answered rows not yet touched by this run
    RerunMissing,
}

/// Answer up to one batch of unanswered questions.
///
/// Fails with `NotFound` if the questionnaire does not exist or is
/// archived. Collaborator failures mid-batch are recorded on the run as
/// `FAILED` with `last_error` set; questions already answered in the batch
/// stay answered, and a later call resumes after them.
pub async fn process_batch(
    store: &dyn QuestionnaireStore,
    assembler: &Assembler,
    org_id: &str,
    questionnaire_id: &str,
    options: &BatchOptions,
    pacer: &dyn Pacer,
) -> AppResult<RunProgress> {
    run_batch(
        store,
        assembler,
        org_id,
        questionnaire_id,
        options,
        pacer,
        BatchMode::Unanswered,
    )
    .await
}

/// Answer up to one batch of previously missing rows.
///
/// Eligible rows are those with no answer or the sentinel answer, excluding
/// rows already touched since this run started. Each processed row gets its
/// `last_rerun_at` stamped, so repeated back-to-back calls never reprocess
/// a row within the same run, even when it persistently finds no evidence.
pub async fn process_rerun_missing_batch(
    store: &dyn QuestionnaireStore,
    assembler: &Assembler,
    org_id: &str,
    questionnaire_id: &str,
    options: &BatchOptions,
    pacer: &dyn Pacer,
) -> AppResult<RunProgress> {
    run_batch(
        store,
        assembler,
        org_id,
        questionnaire_id,
        options,
        pacer,
        BatchMode::RerunMissing,
    )
    .await
}

/// Current progress of a questionnaire, recomputed from row state.
pub async fn run_status(
    store: &dyn QuestionnaireStore,
    org_id: &str,
    questionnaire_id: &str,
) -> AppResult<RunProgress> {
    let run = fetch_questionnaire(store, org_id, questionnaire_id).await?;
    let counts = store.question_counts(questionnaire_id).await?;
    Ok(progress(&run, &counts))
}

async fn run_batch(
    store: &dyn QuestionnaireStore,
    assembler: &Assembler,
    org_id: &str,
    questionnaire_id: &str,
    options: &BatchOptions,
    pacer: &dyn Pacer,
    mode: BatchMode,
) -> AppResult<RunProgress> {
    let mut run = fetch_questionnaire(store, org_id, questionnaire_id).await?;

    if run.status != RunStatus::Running {
        match mode {
            // started_at survives FAILED → RUNNING resumes.
            BatchMode::Unanswered => {
                if run.started_at.is_none() {
                    run.started_at = Some(now_micros());
                }
            }
            // The rerun timestamp defines the eligibility window, so every
            // fresh rerun entry re-stamps it.
            BatchMode::RerunMissing => {
                run.started_at = Some(now_micros());
            }
        }
        run.status = RunStatus::Running;
        run.last_error = None;
        run.finished_at = None;
        store.save_run_state(&run).await?;
    }

    let run_started = run.started_at.unwrap_or_else(Utc::now);

    let batch = select_rows(store, questionnaire_id, run_started, options.batch_size, mode).await?;

    tracing::info!(
        "Autofill batch for questionnaire '{}': {} question(s) selected",
        questionnaire_id,
        batch.len()
    );

    for (i, question) in batch.iter().enumerate() {
        if i > 0 {
            pacer.pause().await;
        }

        if let Err(e) = answer_and_persist(store, assembler, org_id, question, options, mode).await
        {
            tracing::error!(
                "Autofill failed on row {} of questionnaire '{}': {}",
                question.row_index,
                questionnaire_id,
                e
            );

            let counts = store.question_counts(questionnaire_id).await?;
            run.status = RunStatus::Failed;
            run.last_error = Some(e.to_string());
            store.save_run_state(&run).await?;
            return Ok(progress(&run, &counts));
        }

        tracing::debug!("Row {} answered and persisted", question.row_index);
    }

    let counts = store.question_counts(questionnaire_id).await?;
    let remaining = select_rows(store, questionnaire_id, run_started, 1, mode).await?;

    if remaining.is_empty() {
        run.status = RunStatus::Completed;
        run.finished_at = Some(now_micros());
        tracing::info!(
            "Questionnaire '{}' completed: {}/{} answered",
            questionnaire_id,
            counts.processed,
            counts.total
        );
    }
    store.save_run_state(&run).await?;

    Ok(progress(&run, &counts))
}

async fn fetch_questionnaire(
    store: &dyn QuestionnaireStore,
    org_id: &str,
    questionnaire_id: &str,
) -> AppResult<QuestionnaireRow> {
    let run = store
        .get_questionnaire(org_id, questionnaire_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("questionnaire '{}' not found", questionnaire_id))
        })?;

    if run.archived {
        return Err(AppError::NotFound(format!(
            "questionnaire '{}' is archived",
            questionnaire_id
        )));
    }

    Ok(run)
}

async fn select_rows(
    store: &dyn QuestionnaireStore,
    questionnaire_id: &str,
    run_started: chrono::DateTime<Utc>,
    limit: usize,
    mode: BatchMode,
) -> AppResult<Vec<QuestionRow>> {
    match mode {
        BatchMode::Unanswered => store.unanswered_questions(questionnaire_id, limit).await,
        BatchMode::RerunMissing => {
            store
                .rerun_eligible_questions(questionnaire_id, run_started, limit)
                .await
        }
    }
}

/// Answer one question and write it back, stamping rerun rows.
async fn answer_and_persist(
    store: &dyn QuestionnaireStore,
    assembler: &Assembler,
    org_id: &str,
    question: &QuestionRow,
    options: &BatchOptions,
    mode: BatchMode,
) -> AppResult<()> {
    let result = assembler.answer_question(org_id, &question.text).await?;

    let update = AnswerUpdate {
        answer: result.answer,
        citations: result.citations,
        confidence: result.confidence,
        needs_review: result.needs_review,
        not_found_reason: result.not_found_reason,
        debug: if options.persist_debug {
            result.debug
        } else {
            None
        },
    };

    store
        .save_answer(&question.questionnaire_id, question.row_index, &update)
        .await?;

    if mode == BatchMode::RerunMissing {
        store
            .stamp_rerun(&question.questionnaire_id, question.row_index, now_micros())
            .await?;
    }

    Ok(())
}

fn progress(run: &QuestionnaireRow, counts: &QuestionCounts) -> RunProgress {
    RunProgress {
        status: run.status,
        total_count: counts.total,
        processed_count: counts.processed,
        found_count: counts.found(),
        not_found_count: counts.not_found,
        last_error: run.last_error.clone(),
        started_at: run.started_at,
        finished_at: run.finished_at,
    }
}
