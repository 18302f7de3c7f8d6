//! Ingest command handler.

use clap::Args;
use attest_core::{AppConfig, AppResult};
use attest_evidence::{ingest_path, IngestOptions, IngestStats};
use std::path::PathBuf;

/// Ingest evidence documents into the store
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Organization the documents belong to
    #[arg(short, long)]
    pub org: String,

    /// Only ingest paths containing this substring (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing this substring (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    /// Execute the ingest command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = super::open_store(config)?;
        let embedder = super::embedding_client(config)?;

        let options = IngestOptions {
            max_chunk_chars: config.pipeline.max_chunk_chars,
            overlap_chars: config.pipeline.chunk_overlap_chars,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        };

        let mut totals = IngestStats::default();
        for path in &self.paths {
            let stats =
                ingest_path(&*store, embedder.as_ref(), &self.org, path, &options).await?;
            totals.documents += stats.documents;
            totals.chunks += stats.chunks;
            totals.bytes += stats.bytes;
            totals.skipped += stats.skipped;
        }

        if self.json {
            let output = serde_json::json!({
                "documents": totals.documents,
                "chunks": totals.chunks,
                "bytes": totals.bytes,
                "skipped": totals.skipped,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} document(s) as {} chunk(s) ({} bytes, {} skipped)",
                totals.documents, totals.chunks, totals.bytes, totals.skipped
            );
        }

        Ok(())
    }
}
