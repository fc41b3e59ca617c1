//! Wire-level request and response types for the engine API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use strum::{Display, EnumString};

/// Open key/value bag for index settings
pub type Settings = Map<String, Value>;

/// Open key/value bag for index mappings
pub type Mappings = Map<String, Value>;

/// Cluster or index health, ordered from worst to best
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Red,
    Yellow,
    Green,
}

impl HealthStatus {
    /// Primary shards are allocated
    pub fn is_available(&self) -> bool {
        *self >= HealthStatus::Yellow
    }
}

/// One action inside an atomic alias update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        AliasAction::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// Refresh behaviour requested with a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Refresh {
    /// Leave refresh to the index's refresh interval
    #[default]
    False,
    /// Refresh affected shards immediately
    True,
    /// Block until the next scheduled refresh makes the writes visible
    WaitFor,
}

/// A single document write inside a bulk request
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub id: Option<String>,
    pub document: Value,
}

impl BulkOperation {
    /// Build an index operation, taking `_id` from the document's `id` field
    pub fn index(document: Value) -> Self {
        let id = match document.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self { id, document }
    }

    /// NDJSON action line for this operation
    pub fn action_line(&self) -> Value {
        match &self.id {
            Some(id) => serde_json::json!({ "index": { "_id": id } }),
            None => serde_json::json!({ "index": {} }),
        }
    }
}

/// Error attached to a bulk item by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub reason: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.reason)
    }
}

/// Per-item outcome of a bulk write, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: Option<ItemError>,
}

impl BulkItemResult {
    pub fn ok(id: Option<String>) -> Self {
        Self {
            id,
            status: 201,
            error: None,
        }
    }

    pub fn failed(id: Option<String>, status: u16, error: ItemError) -> Self {
        Self {
            id,
            status,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Failure reported by a synchronous reindex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexFailure {
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub cause: Value,
}

/// Outcome of a completed reindex operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReindexResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub failures: Vec<ReindexFailure>,
}

/// A raw hit returned by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
    #[serde(default)]
    pub highlight: Option<std::collections::HashMap<String, Vec<String>>>,
}

/// Normalized query response from the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub hits: Vec<EngineHit>,
    pub total: u64,
    pub took: u64,
    pub timed_out: bool,
    pub aggregations: Option<Value>,
}

/// Search response body as returned over the wire
#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub timed_out: bool,
    pub hits: RawHits,
    #[serde(default)]
    pub aggregations: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawHits {
    #[serde(default)]
    pub total: Option<RawTotal>,
    #[serde(default)]
    pub hits: Vec<EngineHit>,
}

/// `hits.total` is an object on current engines and a bare number on old ones
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawTotal {
    Object { value: u64 },
    Count(u64),
}

impl From<RawSearchResponse> for QueryResponse {
    fn from(raw: RawSearchResponse) -> Self {
        let total = match raw.hits.total {
            Some(RawTotal::Object { value }) | Some(RawTotal::Count(value)) => value,
            None => raw.hits.hits.len() as u64,
        };

        Self {
            hits: raw.hits.hits,
            total,
            took: raw.took,
            timed_out: raw.timed_out,
            aggregations: raw.aggregations,
        }
    }
}
