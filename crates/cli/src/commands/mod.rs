//! Command handlers for the Attest CLI.

pub mod ask;
pub mod autofill;
pub mod import;
pub mod ingest;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use autofill::AutofillCommand;
pub use import::ImportCommand;
pub use ingest::IngestCommand;
pub use status::StatusCommand;

use attest_core::{AppConfig, AppResult};
use attest_evidence::{Assembler, AssemblerOptions, SqliteStore, VectorStore};
use attest_llm::{create_embedding_client, create_generation_client, EmbeddingClient};
use std::sync::Arc;

/// Open the workspace evidence store.
pub(crate) fn open_store(config: &AppConfig) -> AppResult<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(&config.index_path())?))
}

/// Build the embedding client from configuration.
pub(crate) fn embedding_client(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingClient>> {
    create_embedding_client(
        &config.provider,
        config.endpoint.as_deref(),
        &config.embedding_model,
        config.pipeline.embedding_dim,
    )
}

/// Build the answer assembler from configuration.
pub(crate) fn build_assembler(
    config: &AppConfig,
    store: Arc<SqliteStore>,
    debug_enabled: bool,
) -> AppResult<Assembler> {
    let embedder = embedding_client(config)?;
    let generator =
        create_generation_client(&config.provider, config.endpoint.as_deref(), &config.model)?;

    let vector_store: Arc<dyn VectorStore> = store;

    Ok(Assembler::new(
        vector_store,
        embedder,
        generator,
        AssemblerOptions {
            top_k: config.pipeline.top_k,
            snippet_chars: config.pipeline.snippet_chars,
            min_similarity: config.pipeline.min_similarity,
            debug_enabled: debug_enabled || config.pipeline.debug_enabled,
        },
    ))
}
