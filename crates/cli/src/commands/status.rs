//! Status command handler.

use clap::Args;
use attest_core::{AppConfig, AppResult};
use attest_evidence::run_status;

/// Show a questionnaire's run progress
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Questionnaire id
    pub questionnaire: String,

    /// Organization the questionnaire belongs to
    #[arg(short, long)]
    pub org: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    /// Execute the status command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = super::open_store(config)?;
        let progress = run_status(&*store, &self.org, &self.questionnaire).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&progress)?);
            return Ok(());
        }

        println!("status:     {}", progress.status.as_str());
        println!(
            "progress:   {}/{} processed",
            progress.processed_count, progress.total_count
        );
        println!("found:      {}", progress.found_count);
        println!("not found:  {}", progress.not_found_count);

        if let Some(started) = progress.started_at {
            println!("started:    {}", started.to_rfc3339());
        }
        if let Some(finished) = progress.finished_at {
            println!("finished:   {}", finished.to_rfc3339());
        }
        if let Some(error) = &progress.last_error {
            println!("last error: {}", error);
        }

        Ok(())
    }
}
