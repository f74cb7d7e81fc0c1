//! Error types for flotilla.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for flotilla operations.
pub type Result<T> = std::result::Result<T, FlotillaError>;

/// Main error type for flotilla.
#[derive(Error, Debug)]
pub enum FlotillaError {
    // Payload validation errors
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("Edge group not found: {group_id}")]
    EdgeGroupNotFound { group_id: String },

    #[error("Environment {environment_id} does not support the requested deployment type")]
    IncompatibleEnvironmentType { environment_id: String },

    // Entity lookup errors
    #[error("Stack not found: {stack_id}")]
    StackNotFound { stack_id: String },

    #[error("Environment not found: {environment_id}")]
    EnvironmentNotFound { environment_id: String },

    #[error("Environment group not found: {group_id}")]
    EnvironmentGroupNotFound { group_id: String },

    #[error("Relation not found for environment: {environment_id}")]
    RelationNotFound { environment_id: String },

    // Manifest conversion errors
    #[error("Manifest conversion failed: {reason}")]
    ConversionFailed { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlotillaError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Whether the error is caused by the caller's input rather than a
    /// collaborator failure. Callers map these to a bad-request response;
    /// everything else is internal and retryable.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload { .. }
                | Self::EdgeGroupNotFound { .. }
                | Self::IncompatibleEnvironmentType { .. }
        )
    }
}
