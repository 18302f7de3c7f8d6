//! Import command handler.

use clap::Args;
use attest_core::{AppConfig, AppResult};
use attest_evidence::import_questionnaire;
use std::path::PathBuf;

/// Import a questionnaire from a text file, one question per line
#[derive(Args, Debug)]
pub struct ImportCommand {
    /// File with one question per line (blank lines ignored)
    pub file: PathBuf,

    /// Organization the questionnaire belongs to
    #[arg(short, long)]
    pub org: String,

    /// Questionnaire name (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ImportCommand {
    /// Execute the import command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = super::open_store(config)?;

        let contents = std::fs::read_to_string(&self.file)?;
        let questions: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let name = self.name.clone().unwrap_or_else(|| {
            self.file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "questionnaire".to_string())
        });

        let row = import_questionnaire(&*store, &self.org, &name, &questions).await?;

        if self.json {
            let output = serde_json::json!({
                "id": row.id,
                "name": row.name,
                "questions": questions.len(),
                "status": row.status,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Imported questionnaire '{}' ({}) with {} question(s)",
                row.name,
                row.id,
                questions.len()
            );
        }

        Ok(())
    }
}
