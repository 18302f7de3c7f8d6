//! Attest CLI
//!
//! Main entry point for the attest command-line tool. Ingests evidence
//! documents and autofills questionnaires with citation-backed answers.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, AutofillCommand, ImportCommand, IngestCommand, StatusCommand};
use attest_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Attest - evidence-grounded questionnaire answering
#[derive(Parser, Debug)]
#[command(name = "attest")]
#[command(about = "Answer questionnaires from ingested evidence documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "ATTEST_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "ATTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Collaborator provider (ollama, mock)
    #[arg(short, long, global = true, env = "ATTEST_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "ATTEST_MODEL")]
    model: Option<String>,

    /// Collaborator endpoint URL
    #[arg(long, global = true, env = "ATTEST_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest evidence documents into the store
    Ingest(IngestCommand),

    /// Import a questionnaire from a text file (one question per line)
    Import(ImportCommand),

    /// Answer a single question against the ingested evidence
    Ask(AskCommand),

    /// Autofill a questionnaire batch by batch
    Autofill(AutofillCommand),

    /// Show a questionnaire's run progress
    Status(StatusCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;
    config.validate()?;

    tracing::info!("Attest CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);

    config.ensure_attest_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Import(_) => "import",
        Commands::Ask(_) => "ask",
        Commands::Autofill(_) => "autofill",
        Commands::Status(_) => "status",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Import(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Autofill(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
