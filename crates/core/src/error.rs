//! Error types for Attest.
//!
//! This module defines a unified error enum covering all error categories in
//! the application: configuration, lookup failures, collaborator calls
//! (embedding/generation), storage, and serialization.

use thiserror::Error;

/// Unified error type for Attest.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration or invalid caller-supplied parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown questionnaire, question, or document
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding or generation collaborator call failure
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Persistence layer failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
