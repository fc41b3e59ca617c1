//! Index lifecycle: creation with safe defaults, alias-swap reindexing,
//! deletion, settings changes and bulk ingestion.
//!
//! Lifecycle operations are operator-invoked and are not guarded by the
//! circuit breaker; they raise [`IndexError`] on failure instead of
//! degrading quietly. Partial bulk failures are reported in
//! [`BulkIndexResult`], not as errors.

mod bulk;
mod config;
mod error;
mod lock;
mod manager;
mod settings;

pub use bulk::{BulkIndexResult, BulkItemError, BulkOptions};
pub use self::config::{IndexConfig, IndexDefaults, TASK_TEXT_ANALYZER};
pub use error::{IndexError, IndexResult};
pub use lock::{AliasGuard, AliasLocks};
pub use manager::{
    CreateIndexOutcome, DeleteIndexOutcome, IndexLifecycleManager, ReindexReport, SettingsUpdate,
};
pub use settings::{critical_keys, flatten_settings, is_critical, FlatSettings};
