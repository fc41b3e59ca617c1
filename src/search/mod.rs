//! Query execution path for task search
//!
//! This module turns a [`SearchQuery`] into an engine query body, runs it
//! under a per-call deadline and normalizes the answer into a stable
//! [`SearchResponse`]:
//!
//! - **Timeout classification**: simple queries get 200ms, complex ones
//!   (long, or using phrase/fuzzy/boost syntax) get 500ms
//! - **Filters**: exact-match `term`/`terms` clauses in filter context
//! - **Ranking**: relevance first, then an optional secondary sort field
//! - **Highlighting**: snippets for every full-text field
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           QueryExecutor                          │
//! ├─────────────────────────────────────────────────┤
//! │  - prepare()       validation, body building    │
//! │  - try_execute()   engine call under deadline   │
//! │  - execute()       tagged QueryOutcome          │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │           dyn SearchEngine                       │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskhub_search::engine::{ElasticClient, EngineConfig};
//! use taskhub_search::search::{QueryExecutor, QuerySettings, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(ElasticClient::new(EngineConfig::default())?);
//!     let executor = QueryExecutor::new(engine, QuerySettings::default());
//!
//!     let query = SearchQuery::new("login bug")
//!         .with_filter("status", "open")
//!         .with_page(1, 20);
//!
//!     let outcome = executor.execute(&query, "tasks").await?;
//!     println!("Found {} tasks", outcome.response().total);
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod executor;
mod query;
mod response;

pub use self::config::{QuerySettings, WeightedField};
pub use error::SearchError;
pub use executor::{correlation_id, PreparedQuery, QueryExecutor, QueryOutcome};
pub(crate) use executor::record_query;
pub use query::{
    format_time_value, parse_time_value, Pagination, QueryBuilder, QueryComplexity, SearchQuery,
    SortOrder,
};
pub use response::{SearchFailure, SearchFailureKind, SearchResponse, SearchResult};
