//! Collaborator client factory.
//!
//! Creates embedding and generation clients from a provider name plus
//! connection settings, returning shared trait objects the pipeline holds.

use crate::client::{EmbeddingClient, GenerationClient};
use crate::providers::{MockClient, OllamaClient};
use attest_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an embedding client for the named provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `model` - Embedding model identifier
/// * `dimensions` - Embedding vector dimension
pub fn create_embedding_client(
    provider: &str,
    endpoint: Option<&str>,
    model: &str,
    dimensions: usize,
) -> AppResult<Arc<dyn EmbeddingClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_base_url(
                base_url, "", model, dimensions,
            )))
        }
        "mock" => Ok(Arc::new(MockClient::new(dimensions))),
        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: {}. Supported: ollama, mock",
            provider
        ))),
    }
}

/// Create a generation client for the named provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `model` - Generation model identifier
pub fn create_generation_client(
    provider: &str,
    endpoint: Option<&str>,
    model: &str,
) -> AppResult<Arc<dyn GenerationClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_base_url(
                base_url, model, "", 0,
            )))
        }
        "mock" => Ok(Arc::new(MockClient::new(0))),
        _ => Err(AppError::Config(format!(
            "Unknown generation provider: {}. Supported: ollama, mock",
            provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_clients() {
        let embed = create_embedding_client("ollama", None, "nomic-embed-text", 1536);
        assert!(embed.is_ok());

        let gen = create_generation_client("ollama", Some("http://localhost:8080"), "llama3.2");
        assert!(gen.is_ok());
    }

    #[test]
    fn test_create_mock_clients() {
        let embed = create_embedding_client("mock", None, "mock", 384).unwrap();
        assert_eq!(embed.provider_name(), "mock");
        assert_eq!(embed.dimensions(), 384);

        let gen = create_generation_client("mock", None, "mock").unwrap();
        assert_eq!(gen.provider_name(), "mock");
    }

    #[test]
    fn test_unknown_provider() {
        let result = create_embedding_client("unknown", None, "m", 8);
        assert!(result.is_err());

        let result = create_generation_client("unknown", None, "m");
        assert!(result.is_err());
    }
}
