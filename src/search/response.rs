//! Normalized search results

use crate::engine::EngineHit;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use strum::Display;

/// A single matched document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document ID
    pub id: String,

    /// Physical index the document came from
    pub index: String,

    /// Relevance score, 0 when the engine omits it
    pub score: f64,

    /// Original document
    pub source: Map<String, Value>,

    /// Highlighted snippets by field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<HashMap<String, Vec<String>>>,
}

impl From<EngineHit> for SearchResult {
    fn from(hit: EngineHit) -> Self {
        Self {
            id: hit.id,
            index: hit.index,
            score: hit.score.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(0.0),
            source: hit.source,
            highlights: hit.highlight.filter(|h| !h.is_empty()),
        }
    }
}

/// Why a search did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchFailureKind {
    /// The request was malformed and never reached the engine
    Validation,
    /// The engine rejected the query as malformed (4xx-equivalent)
    ClientShape,
    /// The engine failed, was unreachable, or timed out (5xx-equivalent)
    Service,
    /// The circuit breaker is open; the engine was not contacted
    BreakerOpen,
}

/// Failure details attached to an unsuccessful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFailure {
    pub kind: SearchFailureKind,
    pub message: String,
}

/// Outcome of one search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,

    /// Relevance-ranked hits, in engine order
    pub hits: Vec<SearchResult>,

    /// Exact total hit count
    pub total: u64,

    /// Wall-clock milliseconds measured by the caller
    pub took: u64,

    /// Milliseconds reported by the engine itself
    pub engine_took: u64,

    /// Engine returned partial results because its budget ran out
    pub timed_out: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,

    pub correlation_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<SearchFailure>,
}

impl SearchResponse {
    /// Failed response with no hits
    pub fn failed(
        kind: SearchFailureKind,
        message: impl Into<String>,
        correlation_id: impl Into<String>,
        took: u64,
    ) -> Self {
        Self {
            success: false,
            hits: Vec::new(),
            total: 0,
            took,
            engine_took: 0,
            timed_out: false,
            aggregations: None,
            correlation_id: correlation_id.into(),
            failure: Some(SearchFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn failure_kind(&self) -> Option<SearchFailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}
