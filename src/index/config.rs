//! Index definitions and creation defaults

use crate::engine::{validate_index_name, Mappings, Settings};
use crate::index::error::{IndexError, IndexResult};
use crate::index::settings::{flatten_settings, FlatSettings};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Name of the analyzer used by the standard task mappings
pub const TASK_TEXT_ANALYZER: &str = "task_text";

/// Definition of an index to create
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub settings: Option<Settings>,

    #[serde(default)]
    pub mappings: Option<Mappings>,

    /// Aliases attached at creation
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl IndexConfig {
    pub fn new(name: impl Into<String>, settings: Settings, mappings: Mappings) -> Self {
        Self {
            name: name.into(),
            settings: Some(settings),
            mappings: Some(mappings),
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Standard configuration for task indexes
    pub fn standard(name: impl Into<String>) -> Self {
        Self::new(name, standard_settings(), standard_mappings())
    }

    /// Reject missing fields and illegal names before any engine call
    pub fn validate(&self) -> IndexResult<()> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.settings.is_none() {
            missing.push("settings");
        }
        if self.mappings.is_none() {
            missing.push("mappings");
        }
        if !missing.is_empty() {
            return Err(IndexError::Validation(format!(
                "index config is missing required field(s): {}",
                missing.join(", ")
            )));
        }

        validate_index_name(&self.name).map_err(IndexError::Validation)?;
        for alias in &self.aliases {
            validate_index_name(alias).map_err(IndexError::Validation)?;
            if alias == &self.name {
                return Err(IndexError::Validation(format!(
                    "alias '{}' must differ from the index name",
                    alias
                )));
            }
        }
        Ok(())
    }
}

fn standard_settings() -> Settings {
    let value = json!({
        "analysis": {
            "analyzer": {
                TASK_TEXT_ANALYZER: {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "asciifolding"]
                }
            }
        }
    });
    into_map(value)
}

fn standard_mappings() -> Mappings {
    let keyword = json!({ "type": "keyword" });
    let date = json!({ "type": "date" });
    let value = json!({
        "properties": {
            "id": keyword,
            "title": {
                "type": "text",
                "analyzer": TASK_TEXT_ANALYZER,
                "fields": { "keyword": { "type": "keyword", "ignore_above": 256 } }
            },
            "description": { "type": "text", "analyzer": TASK_TEXT_ANALYZER },
            "status": keyword,
            "priority": keyword,
            "project_id": keyword,
            "assignee_id": keyword,
            "reporter_id": keyword,
            "labels": keyword,
            "due_date": date,
            "created_at": date,
            "updated_at": date
        }
    });
    into_map(value)
}

fn into_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Settings applied to every new index unless the caller overrides them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefaults {
    #[serde(default = "default_shards")]
    pub number_of_shards: u64,

    #[serde(default = "default_replicas")]
    pub number_of_replicas: u64,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    #[serde(default = "default_max_result_window")]
    pub max_result_window: u64,

    /// Search slow-log warn threshold
    #[serde(default = "default_search_slowlog_warn")]
    pub search_slowlog_warn: String,

    #[serde(default = "default_search_slowlog_info")]
    pub search_slowlog_info: String,

    /// Indexing slow-log warn threshold
    #[serde(default = "default_indexing_slowlog_warn")]
    pub indexing_slowlog_warn: String,

    #[serde(default = "default_indexing_slowlog_info")]
    pub indexing_slowlog_info: String,

    /// Upper bound on requested primary shards
    #[serde(default = "default_max_shards")]
    pub max_shards: u64,

    /// Upper bound on requested replicas
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u64,

    /// How long `create_index` waits for yellow health
    #[serde(default = "default_health_wait_timeout_ms")]
    pub health_wait_timeout_ms: u64,

    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,

    /// Documents per bulk request when the caller does not choose
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,
}

impl IndexDefaults {
    pub fn health_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.health_wait_timeout_ms)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms.max(1))
    }

    /// Defaults in flattened form
    pub fn to_flat_settings(&self) -> FlatSettings {
        let mut flat = FlatSettings::new();
        flat.insert("number_of_shards".to_string(), json!(self.number_of_shards));
        flat.insert("number_of_replicas".to_string(), json!(self.number_of_replicas));
        flat.insert("refresh_interval".to_string(), json!(self.refresh_interval));
        flat.insert("max_result_window".to_string(), json!(self.max_result_window));
        flat.insert(
            "search.slowlog.threshold.query.warn".to_string(),
            json!(self.search_slowlog_warn),
        );
        flat.insert(
            "search.slowlog.threshold.query.info".to_string(),
            json!(self.search_slowlog_info),
        );
        flat.insert(
            "indexing.slowlog.threshold.index.warn".to_string(),
            json!(self.indexing_slowlog_warn),
        );
        flat.insert(
            "indexing.slowlog.threshold.index.info".to_string(),
            json!(self.indexing_slowlog_info),
        );
        flat
    }

    /// Caller settings merged over the defaults
    pub fn merge(&self, overrides: &Settings) -> FlatSettings {
        let mut flat = self.to_flat_settings();
        flat.extend(flatten_settings(overrides));
        flat
    }
}

impl Default for IndexDefaults {
    fn default() -> Self {
        Self {
            number_of_shards: default_shards(),
            number_of_replicas: default_replicas(),
            refresh_interval: default_refresh_interval(),
            max_result_window: default_max_result_window(),
            search_slowlog_warn: default_search_slowlog_warn(),
            search_slowlog_info: default_search_slowlog_info(),
            indexing_slowlog_warn: default_indexing_slowlog_warn(),
            indexing_slowlog_info: default_indexing_slowlog_info(),
            max_shards: default_max_shards(),
            max_replicas: default_max_replicas(),
            health_wait_timeout_ms: default_health_wait_timeout_ms(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
            bulk_batch_size: default_bulk_batch_size(),
        }
    }
}

fn default_shards() -> u64 {
    1
}

fn default_replicas() -> u64 {
    1
}

fn default_refresh_interval() -> String {
    "1s".to_string()
}

fn default_max_result_window() -> u64 {
    10_000
}

fn default_search_slowlog_warn() -> String {
    "2s".to_string()
}

fn default_search_slowlog_info() -> String {
    "500ms".to_string()
}

fn default_indexing_slowlog_warn() -> String {
    "5s".to_string()
}

fn default_indexing_slowlog_info() -> String {
    "1s".to_string()
}

fn default_max_shards() -> u64 {
    32
}

fn default_max_replicas() -> u64 {
    5
}

fn default_health_wait_timeout_ms() -> u64 {
    30_000
}

fn default_health_poll_interval_ms() -> u64 {
    500
}

fn default_bulk_batch_size() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_listed() {
        let config: IndexConfig = serde_json::from_value(json!({"name": "tasks"})).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("settings"));
        assert!(err.contains("mappings"));
        assert!(!err.contains("name,"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        assert!(IndexConfig::standard("Tasks").validate().is_err());
        assert!(IndexConfig::standard("tasks").with_alias("tasks").validate().is_err());
        assert!(IndexConfig::standard("tasks_v1").with_alias("tasks").validate().is_ok());
    }

    #[test]
    fn test_standard_config_uses_task_analyzer() {
        let config = IndexConfig::standard("tasks_v1");
        let mappings = config.mappings.unwrap();
        assert_eq!(mappings["properties"]["title"]["analyzer"], TASK_TEXT_ANALYZER);
        let flat = flatten_settings(&config.settings.unwrap());
        assert_eq!(flat["analysis.analyzer.task_text.tokenizer"], "standard");
    }

    #[test]
    fn test_merge_prefers_caller_settings() {
        let defaults = IndexDefaults::default();
        let overrides = into_map(json!({"index": {"number_of_replicas": 0, "refresh_interval": "30s"}}));
        let merged = defaults.merge(&overrides);

        assert_eq!(merged["number_of_shards"], 1);
        assert_eq!(merged["number_of_replicas"], 0);
        assert_eq!(merged["refresh_interval"], "30s");
        assert_eq!(merged["max_result_window"], 10_000);
        assert!(merged.contains_key("search.slowlog.threshold.query.warn"));
    }
}
