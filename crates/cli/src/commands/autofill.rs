//! Autofill command handler.
//!
//! Drives the questionnaire state machine, one batch per call or looping
//! until the run completes or fails.

use clap::Args;
use attest_core::{AppConfig, AppResult};
use attest_evidence::{
    process_batch, process_rerun_missing_batch, BatchOptions, RunProgress, RunStatus, TokioPacer,
};

/// Autofill a questionnaire batch by batch
#[derive(Args, Debug)]
pub struct AutofillCommand {
    /// Questionnaire id to process
    pub questionnaire: String,

    /// Organization the questionnaire belongs to
    #[arg(short, long)]
    pub org: String,

    /// Questions answered per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Only reprocess unanswered or not-found rows
    #[arg(long)]
    pub rerun_missing: bool,

    /// Keep calling batches until the run completes or fails
    #[arg(long)]
    pub until_complete: bool,

    /// Persist debug traces on answered rows
    #[arg(long)]
    pub persist_debug: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AutofillCommand {
    /// Execute the autofill command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = super::open_store(config)?;

        let persist_debug = self.persist_debug || config.pipeline.persist_debug;
        // Persisting a trace requires producing one.
        let assembler = super::build_assembler(config, store.clone(), persist_debug)?;

        let options = BatchOptions {
            batch_size: self.batch_size.unwrap_or(config.pipeline.batch_size),
            persist_debug,
        };
        let pacer = TokioPacer::from_millis(config.pipeline.question_delay_ms);

        let progress = loop {
            let progress = if self.rerun_missing {
                process_rerun_missing_batch(
                    &*store,
                    &assembler,
                    &self.org,
                    &self.questionnaire,
                    &options,
                    &pacer,
                )
                .await?
            } else {
                process_batch(
                    &*store,
                    &assembler,
                    &self.org,
                    &self.questionnaire,
                    &options,
                    &pacer,
                )
                .await?
            };

            tracing::info!(
                "Batch done: {} ({}/{} processed)",
                progress.status.as_str(),
                progress.processed_count,
                progress.total_count
            );

            if !self.until_complete || progress.status != RunStatus::Running {
                break progress;
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&progress)?);
        } else {
            print_progress(&progress);
        }

        Ok(())
    }
}

fn print_progress(progress: &RunProgress) {
    println!(
        "{}: {}/{} processed ({} found, {} not found)",
        progress.status.as_str(),
        progress.processed_count,
        progress.total_count,
        progress.found_count,
        progress.not_found_count
    );

    if let Some(error) = &progress.last_error {
        println!("last error: {}", error);
    }
}
