//! Index lifecycle management

use crate::engine::{
    validate_index_name, AliasAction, BulkOperation, EngineError, HealthStatus, Refresh,
    SearchEngine,
};
use crate::index::bulk::{BulkIndexResult, BulkOptions};
use crate::index::config::{IndexConfig, IndexDefaults};
use crate::index::error::{IndexError, IndexResult};
use crate::index::lock::AliasLocks;
use crate::index::settings::{
    count_value, critical_keys, flatten_settings, to_engine_settings, FlatSettings,
};
use crate::metrics::METRICS;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const ALREADY_EXISTS: &str = "resource_already_exists_exception";
const NOT_FOUND: &str = "index_not_found_exception";

/// Result of `create_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CreateIndexOutcome {
    Created,
    /// The index was already there; nothing was changed
    AlreadyExists,
}

/// Result of `delete_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DeleteIndexOutcome {
    Deleted { detached_aliases: Vec<String> },
    NotFound,
}

/// Result of a completed alias-swap reindex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub source: String,
    pub alias: String,
    pub new_index: String,
    /// Documents copied into the new index
    pub documents: u64,
    /// False when the old index could not be removed after the swap
    pub old_index_deleted: bool,
}

/// Result of `update_index_settings`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub index: String,
    pub applied_keys: Vec<String>,
}

/// Creates, reindexes, deletes and feeds indexes
pub struct IndexLifecycleManager {
    engine: Arc<dyn SearchEngine>,
    defaults: IndexDefaults,
    locks: AliasLocks,
    last_version: AtomicI64,
}

impl IndexLifecycleManager {
    pub fn new(engine: Arc<dyn SearchEngine>, defaults: IndexDefaults) -> Self {
        Self {
            engine,
            defaults,
            locks: AliasLocks::new(),
            last_version: AtomicI64::new(0),
        }
    }

    pub fn defaults(&self) -> &IndexDefaults {
        &self.defaults
    }

    /// Whether a reindex onto `alias` is running
    pub fn is_reindexing(&self, alias: &str) -> bool {
        self.locks.is_locked(alias)
    }

    /// Create an index with safe defaults and wait for it to become usable
    pub async fn create_index(&self, config: &IndexConfig) -> IndexResult<CreateIndexOutcome> {
        let result = self.create_index_inner(config).await;
        METRICS.lifecycle("create_index", result.is_ok());
        if let Err(err) = &result {
            error!(index = %config.name, error = %err, "Failed to create index");
        }
        result
    }

    async fn create_index_inner(&self, config: &IndexConfig) -> IndexResult<CreateIndexOutcome> {
        config.validate()?;
        let (Some(settings), Some(mappings)) = (&config.settings, &config.mappings) else {
            return Err(IndexError::Validation("index config is incomplete".to_string()));
        };

        let flat = self.defaults.merge(settings);
        self.check_count(&flat, "number_of_shards", 1, self.defaults.max_shards)?;
        self.check_count(&flat, "number_of_replicas", 0, self.defaults.max_replicas)?;

        if self.engine.index_exists(&config.name).await? {
            info!(index = %config.name, "Index already exists, leaving it untouched");
            return Ok(CreateIndexOutcome::AlreadyExists);
        }

        match self
            .engine
            .create_index(&config.name, &to_engine_settings(&flat), mappings, &config.aliases)
            .await
        {
            Ok(()) => {}
            Err(err) if err.error_type() == Some(ALREADY_EXISTS) => {
                info!(index = %config.name, "Index was created concurrently");
                return Ok(CreateIndexOutcome::AlreadyExists);
            }
            Err(err) => return Err(err.into()),
        }

        self.wait_for_health(&config.name).await?;
        info!(index = %config.name, aliases = ?config.aliases, "Index created");
        Ok(CreateIndexOutcome::Created)
    }

    fn check_count(&self, flat: &FlatSettings, key: &str, min: u64, max: u64) -> IndexResult<()> {
        match count_value(flat, key) {
            None => Ok(()),
            Some(Err(msg)) => Err(IndexError::Validation(msg)),
            Some(Ok(n)) if n < min || n > max => Err(IndexError::Validation(format!(
                "{} must be between {} and {}, got {}",
                key, min, max, n
            ))),
            Some(Ok(_)) => Ok(()),
        }
    }

    /// Poll health until the index is at least yellow
    async fn wait_for_health(&self, index: &str) -> IndexResult<()> {
        let timeout = self.defaults.health_wait_timeout();
        let poll = self.defaults.health_poll_interval();
        let deadline = Instant::now() + timeout;

        loop {
            match self.engine.health(Some(index)).await {
                Ok(status) if status.is_available() => {
                    debug!(index = %index, status = %status, "Index is available");
                    return Ok(());
                }
                Ok(status) => debug!(index = %index, status = %status, "Waiting for index health"),
                Err(err) => debug!(index = %index, error = %err, "Health check failed, retrying"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(IndexError::HealthTimeout {
                    index: index.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    /// Rebuild `source` into a fresh index and move `alias` onto it
    pub async fn reindex(&self, source: &str, alias: &str) -> IndexResult<ReindexReport> {
        let result = self.reindex_inner(source, alias).await;
        METRICS.lifecycle("reindex", result.is_ok());
        if let Err(err) = &result {
            error!(source = %source, alias = %alias, error = %err, "Reindex failed");
        }
        result
    }

    async fn reindex_inner(&self, source: &str, alias: &str) -> IndexResult<ReindexReport> {
        validate_index_name(source).map_err(IndexError::Validation)?;
        validate_index_name(alias).map_err(IndexError::Validation)?;
        if source == alias {
            return Err(IndexError::Validation(format!(
                "source index and alias are both '{}'; pass the concrete index behind the alias",
                source
            )));
        }

        let _guard = self
            .locks
            .try_acquire(alias)
            .ok_or_else(|| IndexError::ReindexInProgress {
                alias: alias.to_string(),
            })?;

        if !self.engine.index_exists(source).await? {
            return Err(IndexError::NotFound(source.to_string()));
        }

        let new_index = format!("{}_v{}", alias, self.next_version());
        info!(source = %source, alias = %alias, new_index = %new_index, "Starting reindex");

        let documents = match self.build_and_swap(source, alias, &new_index).await {
            Ok(documents) => documents,
            Err(err) => {
                // a name clash means the index is not ours to remove
                if !matches!(err, IndexError::Validation(_)) {
                    self.discard(&new_index).await;
                }
                return Err(err);
            }
        };

        let old_index_deleted = match self.delete_index(source).await {
            Ok(_) => true,
            Err(err) => {
                warn!(index = %source, error = %err, "Old index could not be deleted after reindex");
                false
            }
        };

        Ok(ReindexReport {
            source: source.to_string(),
            alias: alias.to_string(),
            new_index,
            documents,
            old_index_deleted,
        })
    }

    /// Create `new_index`, copy `source` into it and make it the alias's only target
    async fn build_and_swap(&self, source: &str, alias: &str, new_index: &str) -> IndexResult<u64> {
        match self.create_index(&IndexConfig::standard(new_index)).await? {
            CreateIndexOutcome::Created => {}
            CreateIndexOutcome::AlreadyExists => {
                return Err(IndexError::Validation(format!(
                    "target index '{}' already exists",
                    new_index
                )));
            }
        }

        let copied = self.engine.reindex(source, new_index).await?;
        if !copied.failures.is_empty() {
            warn!(
                source = %source,
                new_index = %new_index,
                failures = copied.failures.len(),
                "Reindex reported failures, keeping alias where it is"
            );
            return Err(IndexError::ReindexFailed {
                source_index: source.to_string(),
                dest_index: new_index.to_string(),
                failures: copied.failures,
            });
        }

        // detach every current holder, not only the source
        let holders = self.engine.alias_holders(alias).await?;
        let mut actions: Vec<AliasAction> = holders
            .iter()
            .filter(|holder| holder.as_str() != new_index)
            .map(|holder| AliasAction::remove(holder, alias))
            .collect();
        actions.push(AliasAction::add(new_index, alias));

        self.engine.update_aliases(&actions).await?;
        info!(alias = %alias, new_index = %new_index, detached = ?holders, "Alias swapped");
        Ok(copied.created + copied.updated)
    }

    /// Best-effort removal of a half-built index
    async fn discard(&self, index: &str) {
        match self.engine.delete_index(index).await {
            Ok(()) => debug!(index = %index, "Discarded partial index"),
            Err(err) if is_missing(&err) => {}
            Err(err) => warn!(index = %index, error = %err, "Failed to clean up index"),
        }
    }

    /// Strictly increasing epoch-millis version token
    fn next_version(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_version
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(previous + 1)
    }

    /// Delete an index after detaching its aliases. Missing indexes are a no-op.
    pub async fn delete_index(&self, name: &str) -> IndexResult<DeleteIndexOutcome> {
        let result = self.delete_index_inner(name).await;
        METRICS.lifecycle("delete_index", result.is_ok());
        if let Err(err) = &result {
            error!(index = %name, error = %err, "Failed to delete index");
        }
        result
    }

    async fn delete_index_inner(&self, name: &str) -> IndexResult<DeleteIndexOutcome> {
        validate_index_name(name).map_err(IndexError::Validation)?;

        if !self.engine.index_exists(name).await? {
            debug!(index = %name, "Index does not exist, nothing to delete");
            return Ok(DeleteIndexOutcome::NotFound);
        }

        let aliases: Vec<String> = self.engine.get_aliases(name).await?.into_iter().collect();
        if !aliases.is_empty() {
            let actions: Vec<AliasAction> = aliases
                .iter()
                .map(|alias| AliasAction::remove(name, alias))
                .collect();
            self.engine.update_aliases(&actions).await?;
            debug!(index = %name, aliases = ?aliases, "Detached aliases");
        }

        match self.engine.delete_index(name).await {
            Ok(()) => {}
            Err(err) if is_missing(&err) => return Ok(DeleteIndexOutcome::NotFound),
            Err(err) => return Err(err.into()),
        }

        info!(index = %name, "Index deleted");
        Ok(DeleteIndexOutcome::Deleted {
            detached_aliases: aliases,
        })
    }

    /// Change dynamic settings on a live index
    pub async fn update_index_settings(
        &self,
        name: &str,
        settings: &serde_json::Map<String, Value>,
    ) -> IndexResult<SettingsUpdate> {
        let result = self.update_index_settings_inner(name, settings).await;
        METRICS.lifecycle("update_settings", result.is_ok());
        if let Err(err) = &result {
            error!(index = %name, error = %err, "Failed to update index settings");
        }
        result
    }

    async fn update_index_settings_inner(
        &self,
        name: &str,
        settings: &serde_json::Map<String, Value>,
    ) -> IndexResult<SettingsUpdate> {
        validate_index_name(name).map_err(IndexError::Validation)?;

        let flat = flatten_settings(settings);
        if flat.is_empty() {
            return Err(IndexError::Validation("no settings to update".to_string()));
        }

        let critical = critical_keys(&flat);
        if !critical.is_empty() {
            return Err(IndexError::CriticalSetting { keys: critical });
        }
        self.check_count(&flat, "number_of_replicas", 0, self.defaults.max_replicas)?;

        if !self.engine.index_exists(name).await? {
            return Err(IndexError::NotFound(name.to_string()));
        }

        self.engine
            .put_settings(name, &to_engine_settings(&flat))
            .await
            .map_err(|err| {
                if is_missing(&err) {
                    IndexError::NotFound(name.to_string())
                } else {
                    err.into()
                }
            })?;

        let applied_keys: Vec<String> = flat.into_keys().collect();
        info!(index = %name, keys = ?applied_keys, "Index settings updated");
        Ok(SettingsUpdate {
            index: name.to_string(),
            applied_keys,
        })
    }

    /// Write documents in batches, accounting for every document
    pub async fn bulk_index(
        &self,
        index: &str,
        documents: Vec<Value>,
        options: BulkOptions,
    ) -> IndexResult<BulkIndexResult> {
        validate_index_name(index).map_err(IndexError::Validation)?;
        if options.batch_size == 0 {
            return Err(IndexError::Validation("batch_size must be at least 1".to_string()));
        }

        let mut result = BulkIndexResult::new();
        let mut positions = Vec::with_capacity(documents.len());
        let mut ops = Vec::with_capacity(documents.len());
        for (position, document) in documents.into_iter().enumerate() {
            if document.is_object() {
                positions.push(position);
                ops.push(BulkOperation::index(document));
            } else {
                result.record_invalid(position, "document must be a JSON object");
            }
        }

        let batches = ops.len().div_ceil(options.batch_size);
        for (n, (batch_positions, batch)) in positions
            .chunks(options.batch_size)
            .zip(ops.chunks(options.batch_size))
            .enumerate()
        {
            let refresh = if n + 1 == batches {
                options.refresh
            } else {
                Refresh::False
            };

            match self.engine.bulk_write(index, batch, refresh).await {
                Ok(items) => result.record_items(batch_positions, batch, items),
                Err(err) => {
                    warn!(
                        index = %index,
                        batch = n,
                        documents = batch.len(),
                        error = %err,
                        "Bulk batch failed, continuing with the next batch"
                    );
                    let error_type = err.error_type().unwrap_or("transport_error").to_string();
                    result.record_batch_failure(batch_positions, batch, &error_type, &err.to_string());
                }
            }
        }

        let result = result.finish();
        METRICS
            .bulk_documents
            .with_label_values(&[index, "indexed"])
            .inc_by(result.indexed as f64);
        METRICS
            .bulk_documents
            .with_label_values(&[index, "failed"])
            .inc_by(result.failed as f64);

        if result.success {
            info!(index = %index, indexed = result.indexed, batches = result.batches, "Bulk index complete");
        } else {
            warn!(
                index = %index,
                indexed = result.indexed,
                failed = result.failed,
                "Bulk index completed with failures"
            );
        }
        Ok(result)
    }

    /// Health of the cluster or one index
    pub async fn health(&self, index: Option<&str>) -> IndexResult<HealthStatus> {
        if let Some(name) = index {
            validate_index_name(name).map_err(IndexError::Validation)?;
        }
        Ok(self.engine.health(index).await?)
    }
}

fn is_missing(err: &EngineError) -> bool {
    err.status() == Some(404) || err.error_type() == Some(NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        BulkItemResult, EngineResult, Mappings, QueryResponse, ReindexResponse, Settings,
    };
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::time::Duration;

    /// Engine that knows nothing and accepts nothing
    struct Unreachable;

    #[async_trait]
    impl SearchEngine for Unreachable {
        async fn health(&self, _: Option<&str>) -> EngineResult<HealthStatus> {
            Err(EngineError::Transport("down".into()))
        }
        async fn index_exists(&self, _: &str) -> EngineResult<bool> {
            Err(EngineError::Transport("down".into()))
        }
        async fn create_index(&self, _: &str, _: &Settings, _: &Mappings, _: &[String]) -> EngineResult<()> {
            Err(EngineError::Transport("down".into()))
        }
        async fn delete_index(&self, _: &str) -> EngineResult<()> {
            Err(EngineError::Transport("down".into()))
        }
        async fn get_aliases(&self, _: &str) -> EngineResult<BTreeSet<String>> {
            Err(EngineError::Transport("down".into()))
        }
        async fn alias_holders(&self, _: &str) -> EngineResult<BTreeSet<String>> {
            Err(EngineError::Transport("down".into()))
        }
        async fn update_aliases(&self, _: &[AliasAction]) -> EngineResult<()> {
            Err(EngineError::Transport("down".into()))
        }
        async fn get_settings(&self, _: &str) -> EngineResult<Settings> {
            Err(EngineError::Transport("down".into()))
        }
        async fn put_settings(&self, _: &str, _: &Settings) -> EngineResult<()> {
            Err(EngineError::Transport("down".into()))
        }
        async fn bulk_write(&self, _: &str, _: &[BulkOperation], _: Refresh) -> EngineResult<Vec<BulkItemResult>> {
            Err(EngineError::Transport("down".into()))
        }
        async fn reindex(&self, _: &str, _: &str) -> EngineResult<ReindexResponse> {
            Err(EngineError::Transport("down".into()))
        }
        async fn query(&self, _: &str, _: &Value, _: Duration) -> EngineResult<QueryResponse> {
            Err(EngineError::Transport("down".into()))
        }
    }

    fn manager() -> IndexLifecycleManager {
        IndexLifecycleManager::new(Arc::new(Unreachable), IndexDefaults::default())
    }

    #[test]
    fn test_version_tokens_strictly_increase() {
        let manager = manager();
        let mut last = 0;
        for _ in 0..100 {
            let next = manager.next_version();
            assert!(next > last);
            last = next;
        }
    }

    #[tokio::test]
    async fn test_critical_settings_rejected_before_engine_call() {
        let settings = serde_json::json!({"index": {"number_of_shards": 3, "refresh_interval": "5s"}});
        let err = manager()
            .update_index_settings("tasks", settings.as_object().unwrap())
            .await
            .unwrap_err();
        match err {
            IndexError::CriticalSetting { keys } => assert_eq!(keys, vec!["number_of_shards"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let err = manager()
            .bulk_index("tasks", vec![serde_json::json!({"id": "t-1"})], BulkOptions::default().with_batch_size(0))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reindex_onto_own_name_rejected() {
        let err = manager().reindex("tasks", "tasks").await.unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
    }
}
