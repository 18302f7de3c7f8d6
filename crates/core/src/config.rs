//! Configuration management for Attest.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.attest/config.yaml)
//!
//! The configuration is workspace-centric, with state stored in `.attest/`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// behavior across commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .attest/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Collaborator provider for embedding and generation ("ollama", "mock")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Collaborator endpoint URL (provider-specific default when absent)
    pub endpoint: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Answering pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Tuning knobs for the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Overlap between consecutive chunks, in characters
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,

    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Character budget for quoted snippets
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Minimum top similarity required before generating an answer
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Questions answered per autofill batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between questions in a batch, in milliseconds
    #[serde(default = "default_question_delay_ms")]
    pub question_delay_ms: u64,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Attach a debug trace to answers
    #[serde(default)]
    pub debug_enabled: bool,

    /// Persist the debug trace alongside answered rows
    #[serde(default)]
    pub persist_debug: bool,
}

fn default_max_chunk_chars() -> usize {
    1800
}

fn default_chunk_overlap_chars() -> usize {
    200
}

fn default_top_k() -> usize {
    5
}

fn default_snippet_chars() -> usize {
    600
}

fn default_min_similarity() -> f32 {
    0.35
}

fn default_batch_size() -> usize {
    5
}

fn default_question_delay_ms() -> u64 {
    750
}

fn default_embedding_dim() -> usize {
    1536
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
            min_similarity: default_min_similarity(),
            batch_size: default_batch_size(),
            question_delay_ms: default_question_delay_ms(),
            embedding_dim: default_embedding_dim(),
            debug_enabled: false,
            persist_debug: false,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    provider: Option<ProviderSection>,
    pipeline: Option<PipelineConfig>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProviderSection {
    name: Option<String>,
    model: Option<String>,
    #[serde(rename = "embeddingModel")]
    embedding_model: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            endpoint: None,
            log_level: None,
            verbose: false,
            no_color: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `ATTEST_WORKSPACE`: Override workspace path
    /// - `ATTEST_CONFIG`: Path to config file
    /// - `ATTEST_PROVIDER`: Collaborator provider
    /// - `ATTEST_MODEL`: Generation model identifier
    /// - `ATTEST_EMBEDDING_MODEL`: Embedding model identifier
    /// - `ATTEST_ENDPOINT`: Collaborator endpoint URL
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("ATTEST_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("ATTEST_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".attest/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ATTEST_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ATTEST_MODEL") {
            config.model = model;
        }

        if let Ok(model) = std::env::var("ATTEST_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }

        if let Ok(endpoint) = std::env::var("ATTEST_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(provider) = config_file.provider {
            if let Some(name) = provider.name {
                result.provider = name;
            }
            if let Some(model) = provider.model {
                result.model = model;
            }
            if let Some(model) = provider.embedding_model {
                result.embedding_model = model;
            }
            if let Some(endpoint) = provider.endpoint {
                result.endpoint = Some(endpoint);
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        endpoint: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(endpoint) = endpoint {
            self.endpoint = Some(endpoint);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .attest directory.
    pub fn attest_dir(&self) -> PathBuf {
        self.workspace.join(".attest")
    }

    /// Get the path of the evidence database.
    pub fn index_path(&self) -> PathBuf {
        self.attest_dir().join("evidence.db")
    }

    /// Ensure the .attest directory exists.
    pub fn ensure_attest_dir(&self) -> AppResult<()> {
        let dir = self.attest_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .attest directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "mock"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if self.pipeline.chunk_overlap_chars >= self.pipeline.max_chunk_chars {
            return Err(AppError::Config(format!(
                "chunk_overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                self.pipeline.chunk_overlap_chars, self.pipeline.max_chunk_chars
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.embedding_model, "nomic-embed-text");
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert_eq!(config.pipeline.top_k, 5);
        assert_eq!(config.pipeline.batch_size, 5);
    }

    #[test]
    fn test_attest_dir() {
        let config = AppConfig::default();
        let dir = config.attest_dir();
        assert!(dir.ends_with(".attest"));
        assert!(config.index_path().ends_with(".attest/evidence.db"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("mock".to_string()),
            Some("test-model".to_string()),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "mock");
        assert_eq!(overridden.model, "test-model");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlap_bounds() {
        let mut config = AppConfig::default();
        config.pipeline.chunk_overlap_chars = config.pipeline.max_chunk_chars;
        assert!(config.validate().is_err());
    }
}
