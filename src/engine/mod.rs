//! Engine client adapter
//!
//! The only part of the crate that speaks the search engine's wire protocol.
//! Everything above it depends on the [`SearchEngine`] capability trait, so
//! tests and alternative backends plug in without touching the core:
//!
//! ```text
//! SearchOrchestrator ──► QueryExecutor ─────┐
//!          │                                  ├──► dyn SearchEngine ──► ElasticClient ──► HTTP
//!          └─────────► IndexLifecycleManager ─┘
//! ```
//!
//! Connection-level retry and backoff are configured through [`EngineConfig`].

mod client;
mod config;
mod error;
mod naming;
mod types;

pub use client::ElasticClient;
pub use self::config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorClass};
pub use naming::validate_index_name;
pub use types::{
    AliasAction, BulkItemResult, BulkOperation, EngineHit, HealthStatus, ItemError, Mappings,
    QueryResponse, Refresh, ReindexFailure, ReindexResponse, Settings,
};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// Minimal capability set the search layer needs from an engine
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Cluster health, or the health of one index
    async fn health(&self, index: Option<&str>) -> EngineResult<HealthStatus>;

    async fn index_exists(&self, name: &str) -> EngineResult<bool>;

    async fn create_index(
        &self,
        name: &str,
        settings: &Settings,
        mappings: &Mappings,
        aliases: &[String],
    ) -> EngineResult<()>;

    async fn delete_index(&self, name: &str) -> EngineResult<()>;

    /// Aliases currently pointing at `name`
    async fn get_aliases(&self, name: &str) -> EngineResult<BTreeSet<String>>;

    /// Physical indexes `alias` currently points at; empty when the alias does not exist
    async fn alias_holders(&self, alias: &str) -> EngineResult<BTreeSet<String>>;

    /// Apply all actions in one atomic call
    async fn update_aliases(&self, actions: &[AliasAction]) -> EngineResult<()>;

    async fn get_settings(&self, name: &str) -> EngineResult<Settings>;

    async fn put_settings(&self, name: &str, settings: &Settings) -> EngineResult<()>;

    /// Write one batch; the result has one entry per operation, in order
    async fn bulk_write(
        &self,
        index: &str,
        ops: &[BulkOperation],
        refresh: Refresh,
    ) -> EngineResult<Vec<BulkItemResult>>;

    /// Copy every document from `source` into `dest`, waiting for completion
    async fn reindex(&self, source: &str, dest: &str) -> EngineResult<ReindexResponse>;

    /// Run a search body against `index`, giving up after `timeout`
    async fn query(&self, index: &str, body: &Value, timeout: Duration) -> EngineResult<QueryResponse>;
}
