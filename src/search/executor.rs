//! Query execution against the engine

use crate::engine::{validate_index_name, SearchEngine};
use crate::metrics::METRICS;
use crate::search::config::QuerySettings;
use crate::search::error::SearchError;
use crate::search::query::{QueryBuilder, SearchQuery};
use crate::search::response::{SearchFailureKind, SearchResponse, SearchResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Tagged result of a search that passed validation
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success(SearchResponse),
    Failure(SearchResponse),
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success(_))
    }

    pub fn response(&self) -> &SearchResponse {
        match self {
            QueryOutcome::Success(r) | QueryOutcome::Failure(r) => r,
        }
    }

    pub fn into_response(self) -> SearchResponse {
        match self {
            QueryOutcome::Success(r) | QueryOutcome::Failure(r) => r,
        }
    }
}

/// A validated query, ready to send
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub index: String,
    pub body: Value,
    /// Engine-side budget
    pub budget: Duration,
    /// Budget plus client grace; the caller stops waiting after this
    pub deadline: Duration,
    pub correlation_id: String,
}

/// Runs search queries through a `SearchEngine`
pub struct QueryExecutor {
    engine: Arc<dyn SearchEngine>,
    settings: QuerySettings,
}

impl QueryExecutor {
    pub fn new(engine: Arc<dyn SearchEngine>, settings: QuerySettings) -> Self {
        Self { engine, settings }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Validate a query and build its engine body. No engine call is made.
    pub fn prepare(&self, query: &SearchQuery, index: &str) -> Result<PreparedQuery, SearchError> {
        validate_index_name(index).map_err(SearchError::Validation)?;
        query.check(&self.settings)?;

        let budget = query.resolve_timeout(&self.settings)?;
        let body = QueryBuilder::new(&self.settings).build(query, budget);

        Ok(PreparedQuery {
            index: index.to_string(),
            body,
            budget,
            deadline: budget + self.settings.client_grace(),
            correlation_id: correlation_id(query),
        })
    }

    /// Send a prepared query. Engine errors and deadline overruns come back as `Err`.
    pub async fn try_execute(&self, prepared: &PreparedQuery) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();
        debug!(
            index = %prepared.index,
            correlation_id = %prepared.correlation_id,
            budget_ms = prepared.budget.as_millis() as u64,
            "Executing search"
        );

        let result = tokio::time::timeout(
            prepared.deadline,
            self.engine
                .query(&prepared.index, &prepared.body, prepared.deadline),
        )
        .await;

        let elapsed = start.elapsed();
        METRICS
            .query_duration
            .with_label_values(&[&prepared.index])
            .observe(elapsed.as_secs_f64());

        let response = match result {
            Err(_) => Err(SearchError::Timeout(prepared.deadline)),
            Ok(Err(err)) => Err(SearchError::Engine(err)),
            Ok(Ok(response)) => Ok(response),
        };

        match response {
            Ok(response) => {
                record_query(&prepared.index, "success");
                if response.timed_out {
                    warn!(
                        index = %prepared.index,
                        correlation_id = %prepared.correlation_id,
                        "Engine returned partial results after its timeout"
                    );
                }
                Ok(SearchResponse {
                    success: true,
                    hits: response.hits.into_iter().map(SearchResult::from).collect(),
                    total: response.total,
                    took: elapsed.as_millis() as u64,
                    engine_took: response.took,
                    timed_out: response.timed_out,
                    aggregations: response.aggregations,
                    correlation_id: prepared.correlation_id.clone(),
                    failure: None,
                })
            }
            Err(err) => {
                let kind = err.failure_kind();
                record_query(&prepared.index, &kind.to_string());
                warn!(
                    index = %prepared.index,
                    correlation_id = %prepared.correlation_id,
                    kind = %kind,
                    error = %err,
                    "Search failed"
                );
                Err(err)
            }
        }
    }

    /// Validate and run a query without a breaker
    pub async fn execute(&self, query: &SearchQuery, index: &str) -> Result<QueryOutcome, SearchError> {
        let prepared = match self.prepare(query, index) {
            Ok(prepared) => prepared,
            Err(err) => {
                record_query(index, &SearchFailureKind::Validation.to_string());
                return Err(err);
            }
        };

        let start = Instant::now();
        Ok(match self.try_execute(&prepared).await {
            Ok(response) => QueryOutcome::Success(response),
            Err(err) => QueryOutcome::Failure(SearchResponse::failed(
                err.failure_kind(),
                err.to_string(),
                prepared.correlation_id,
                start.elapsed().as_millis() as u64,
            )),
        })
    }
}

/// Caller-supplied correlation ID, or a fresh UUID
pub fn correlation_id(query: &SearchQuery) -> String {
    query
        .correlation_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Index label for names that fail validation
const INVALID_INDEX_LABEL: &str = "invalid";

pub(crate) fn record_query(index: &str, outcome: &str) {
    METRICS
        .queries
        .with_label_values(&[index_label(index), outcome])
        .inc();
}

fn index_label(index: &str) -> &str {
    if validate_index_name(index).is_ok() {
        index
    } else {
        INVALID_INDEX_LABEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_index_names_share_one_label() {
        assert_eq!(index_label("tasks"), "tasks");
        assert_eq!(index_label("Tasks With Spaces"), INVALID_INDEX_LABEL);
        assert_eq!(index_label(""), INVALID_INDEX_LABEL);

        let counter = METRICS
            .queries
            .with_label_values(&[INVALID_INDEX_LABEL, "validation"]);
        let before = counter.get();
        record_query("../_all?", "validation");
        assert!(counter.get() >= before + 1.0);
    }
}
