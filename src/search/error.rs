//! Error types for search operations

use crate::engine::{EngineError, ErrorClass};
use crate::error::AppError;
use crate::search::response::SearchFailureKind;
use std::time::Duration;

/// Errors that can occur during search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Query or index name is malformed; nothing was sent to the engine
    #[error("Invalid search request: {0}")]
    Validation(String),

    /// Engine call failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No answer within the client-side deadline
    #[error("Search timed out after {0:?}")]
    Timeout(Duration),
}

impl SearchError {
    /// Map to the failure kind reported in a `SearchResponse`
    pub fn failure_kind(&self) -> SearchFailureKind {
        match self {
            SearchError::Validation(_) => SearchFailureKind::Validation,
            SearchError::Engine(err) if err.class() == ErrorClass::ClientShape => {
                SearchFailureKind::ClientShape
            }
            SearchError::Engine(_) | SearchError::Timeout(_) => SearchFailureKind::Service,
        }
    }
}

impl From<validator::ValidationErrors> for SearchError {
    fn from(err: validator::ValidationErrors) -> Self {
        SearchError::Validation(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(msg) => AppError::Validation(msg),
            SearchError::Engine(err) => err.into(),
            SearchError::Timeout(d) => AppError::Timeout(format!("search after {:?}", d)),
        }
    }
}
