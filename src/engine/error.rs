//! Error types for engine client operations

use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// How a failure should be treated by callers of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself was malformed (4xx-equivalent)
    ClientShape,
    /// The engine was unreachable, timed out, or failed internally (5xx-equivalent)
    Service,
}

/// Errors surfaced by the engine client adapter
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Engine could not be reached
    #[error("Engine transport error: {0}")]
    Transport(String),

    /// Engine did not answer within the request deadline
    #[error("Engine request timed out after {0:?}")]
    Timeout(Duration),

    /// Engine answered with an error body
    #[error("Engine error ({status}) {error_type}: {reason}")]
    Api {
        status: u16,
        error_type: String,
        reason: String,
    },

    /// Engine answered with something we could not decode
    #[error("Failed to decode engine response: {0}")]
    Decode(String),

    /// Client configuration is unusable
    #[error("Invalid engine configuration: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Classify the error for response shaping and breaker accounting
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Api { status, .. }
                if (400..500).contains(status) && *status != 408 && *status != 429 =>
            {
                ErrorClass::ClientShape
            }
            _ => ErrorClass::Service,
        }
    }

    /// Whether a connection-level retry against another node may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport(_) | EngineError::Timeout(_) => true,
            EngineError::Api { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    /// HTTP status reported by the engine, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Engine error type (e.g. `index_not_found_exception`), if any
    pub fn error_type(&self) -> Option<&str> {
        match self {
            EngineError::Api { error_type, .. } => Some(error_type),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            EngineError::Timeout(timeout)
        } else if err.is_decode() {
            EngineError::Decode(err.to_string())
        } else {
            EngineError::Transport(err.to_string())
        }
    }

    /// Build an API error from a non-success status and the raw response body
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: ErrorBody,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ErrorBody {
            Detailed {
                #[serde(rename = "type")]
                error_type: String,
                #[serde(default)]
                reason: Option<String>,
            },
            Plain(String),
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(Envelope {
                error: ErrorBody::Detailed { error_type, reason },
            }) => EngineError::Api {
                status,
                error_type,
                reason: reason.unwrap_or_default(),
            },
            Ok(Envelope {
                error: ErrorBody::Plain(reason),
            }) => EngineError::Api {
                status,
                error_type: "error".to_string(),
                reason,
            },
            Err(_) => EngineError::Api {
                status,
                error_type: "http_error".to_string(),
                reason: body.chars().take(512).collect(),
            },
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Decode(err.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Timeout(d) => AppError::Timeout(format!("engine request after {:?}", d)),
            EngineError::Configuration(msg) => AppError::Configuration(msg),
            err if err.class() == ErrorClass::ClientShape => AppError::BadRequest(err.to_string()),
            err => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}
