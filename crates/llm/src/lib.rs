//! Collaborator clients for Attest.
//!
//! This crate provides provider-agnostic abstractions for the two model
//! collaborators the answering pipeline depends on: text embedding and
//! grounded answer generation. Both are exposed through trait-based
//! interfaces so the pipeline never knows which provider it is talking to.
//!
//! # Providers
//! - **Ollama**: local model runtime (default)
//! - **Mock**: deterministic, offline implementation for tests and dry runs

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{
    Confidence, EmbeddingClient, GenerationClient, GenerationOutcome, GenerationRequest,
    SnippetRef,
};
pub use factory::{create_embedding_client, create_generation_client};
pub use providers::{MockClient, OllamaClient};
