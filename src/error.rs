//! Error types for the lead-intake library.
//!
//! This module provides custom error types using `thiserror` for better error handling
//! and more specific error messages throughout the application.

use thiserror::Error;

/// Errors that can occur in the lead-intake service.
#[derive(Error, Debug)]
pub enum LeadIntakeError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Outbound HTTP errors (ad platforms, mail relay)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request could not be interpreted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Lead not found
    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    /// Notification delivery failed
    #[error("Mail error: {0}")]
    Mail(String),

    /// Blocking task failed to complete
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with LeadIntakeError
pub type Result<T> = std::result::Result<T, LeadIntakeError>;

impl From<anyhow::Error> for LeadIntakeError {
    fn from(err: anyhow::Error) -> Self {
        LeadIntakeError::Other(err.to_string())
    }
}
