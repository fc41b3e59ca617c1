//! Error types for index lifecycle operations

use crate::engine::{EngineError, ReindexFailure};
use crate::error::AppError;
use std::time::Duration;

/// Result type for lifecycle operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Errors raised by the index lifecycle manager
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Configuration or arguments are invalid; nothing was sent to the engine
    #[error("Invalid index request: {0}")]
    Validation(String),

    /// Another reindex holds the alias
    #[error("A reindex onto alias '{alias}' is already in progress")]
    ReindexInProgress { alias: String },

    #[error("Index not found: {0}")]
    NotFound(String),

    /// Static settings cannot change on a live index
    #[error(
        "Settings {keys:?} cannot be changed on an existing index; reindex into a new index instead"
    )]
    CriticalSetting { keys: Vec<String> },

    /// The engine reported per-document failures while copying
    #[error("Reindex from '{source_index}' into '{dest_index}' failed for {} document(s)", .failures.len())]
    ReindexFailed {
        source_index: String,
        dest_index: String,
        failures: Vec<ReindexFailure>,
    },

    /// The index never reached yellow health
    #[error("Index '{index}' did not reach yellow health within {waited:?}")]
    HealthTimeout { index: String, waited: Duration },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Validation(msg) => AppError::Validation(msg),
            IndexError::CriticalSetting { .. } => AppError::BadRequest(err.to_string()),
            IndexError::ReindexInProgress { .. } => AppError::Conflict(err.to_string()),
            IndexError::NotFound(name) => AppError::NotFound(format!("index {}", name)),
            IndexError::ReindexFailed { .. } => AppError::Internal(err.to_string()),
            IndexError::HealthTimeout { .. } => AppError::Timeout(err.to_string()),
            IndexError::Engine(err) => err.into(),
        }
    }
}
