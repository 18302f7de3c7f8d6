//! Ask command handler.
//!
//! Answers a single question against the ingested evidence and prints the
//! answer with its citations.

use clap::Args;
use attest_core::{AppConfig, AppResult};

/// Answer a single question against the ingested evidence
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to answer
    pub question: String,

    /// Organization whose evidence to use
    #[arg(short, long)]
    pub org: String,

    /// Attach the retrieval/guardrail debug trace
    #[arg(long)]
    pub debug: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = super::open_store(config)?;
        let assembler = super::build_assembler(config, store, self.debug)?;

        let result = assembler.answer_question(&self.org, &self.question).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        println!("{}", result.answer);

        if let Some(reason) = &result.not_found_reason {
            println!("  (reason: {})", reason);
        }

        if !result.citations.is_empty() {
            println!();
            println!("Citations:");
            for citation in &result.citations {
                println!("  [{} · {}]", citation.doc_name, citation.chunk_id);
                println!("    \"{}\"", citation.quoted_snippet);
            }
        }

        println!();
        println!(
            "confidence: {} | needs review: {}",
            result.confidence.as_str(),
            result.needs_review
        );

        if let Some(trace) = &result.debug {
            println!();
            println!("debug: {}", serde_json::to_string_pretty(trace)?);
        }

        Ok(())
    }
}
