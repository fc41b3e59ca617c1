//! Composition point for the search layer
//!
//! [`SearchOrchestrator`] owns the query-path circuit breaker and wires the
//! [`QueryExecutor`] and [`IndexLifecycleManager`] to one engine. It is the
//! only type an outer API layer needs.

use crate::circuit_breaker::{CallError, CircuitBreaker, CircuitBreakerState, CircuitBreakerStats};
use crate::config::Config;
use crate::engine::{ElasticClient, HealthStatus, SearchEngine};
use crate::error::Result;
use crate::index::{
    BulkIndexResult, BulkOptions, CreateIndexOutcome, DeleteIndexOutcome, IndexConfig,
    IndexDefaults, IndexLifecycleManager, IndexResult, ReindexReport, SettingsUpdate,
};
use crate::search::{
    correlation_id, record_query, QueryExecutor, QuerySettings, SearchFailureKind, SearchQuery,
    SearchResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Settings shared by the query path and the lifecycle manager
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub index: IndexDefaults,
}

/// Entry point for search and index lifecycle calls
pub struct SearchOrchestrator {
    executor: QueryExecutor,
    lifecycle: IndexLifecycleManager,
    breaker: Arc<CircuitBreaker>,
}

impl SearchOrchestrator {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        breaker: Arc<CircuitBreaker>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(Arc::clone(&engine), settings.query),
            lifecycle: IndexLifecycleManager::new(engine, settings.index),
            breaker,
        }
    }

    /// Build the HTTP client and the breaker from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let engine = ElasticClient::connect(config.engine.clone()).await?;
        let breaker = CircuitBreaker::new(
            config.query.breaker_name.clone(),
            config.breaker.to_breaker_config()?,
        );

        info!(nodes = ?engine.nodes(), breaker = %breaker.name(), "Search orchestrator ready");
        Ok(Self::new(
            Arc::new(engine),
            Arc::new(breaker),
            SearchSettings {
                query: config.query.clone(),
                index: config.index.clone(),
            },
        ))
    }

    /// Run a search. Every failure comes back inside the response.
    pub async fn search(&self, query: &SearchQuery, index: &str) -> SearchResponse {
        let start = Instant::now();

        let prepared = match self.executor.prepare(query, index) {
            Ok(prepared) => prepared,
            Err(err) => {
                record_query(index, &SearchFailureKind::Validation.to_string());
                return SearchResponse::failed(
                    err.failure_kind(),
                    err.to_string(),
                    correlation_id(query),
                    elapsed_ms(start),
                );
            }
        };

        match self.breaker.call(|| self.executor.try_execute(&prepared)).await {
            Ok(response) => response,
            Err(CallError::Rejected { name }) => {
                record_query(index, &SearchFailureKind::BreakerOpen.to_string());
                warn!(
                    index = %index,
                    correlation_id = %prepared.correlation_id,
                    breaker = %name,
                    "Search rejected by open circuit"
                );
                SearchResponse::failed(
                    SearchFailureKind::BreakerOpen,
                    format!("search is temporarily degraded: circuit '{}' is open", name),
                    prepared.correlation_id,
                    elapsed_ms(start),
                )
            }
            Err(CallError::Failed(err)) => SearchResponse::failed(
                err.failure_kind(),
                err.to_string(),
                prepared.correlation_id,
                elapsed_ms(start),
            ),
        }
    }

    pub async fn create_index(&self, config: &IndexConfig) -> IndexResult<CreateIndexOutcome> {
        self.lifecycle.create_index(config).await
    }

    pub async fn reindex(&self, source: &str, alias: &str) -> IndexResult<ReindexReport> {
        self.lifecycle.reindex(source, alias).await
    }

    pub async fn delete_index(&self, name: &str) -> IndexResult<DeleteIndexOutcome> {
        self.lifecycle.delete_index(name).await
    }

    pub async fn update_index_settings(
        &self,
        name: &str,
        settings: &Map<String, Value>,
    ) -> IndexResult<SettingsUpdate> {
        self.lifecycle.update_index_settings(name, settings).await
    }

    pub async fn bulk_index(
        &self,
        index: &str,
        documents: Vec<Value>,
        options: BulkOptions,
    ) -> IndexResult<BulkIndexResult> {
        self.lifecycle.bulk_index(index, documents, options).await
    }

    /// Cluster health, or the health of one index
    pub async fn health(&self, index: Option<&str>) -> IndexResult<HealthStatus> {
        self.lifecycle.health(index).await
    }

    pub fn breaker_state(&self) -> CircuitBreakerState {
        self.breaker.state()
    }

    pub fn breaker_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }

    pub fn lifecycle(&self) -> &IndexLifecycleManager {
        &self.lifecycle
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
