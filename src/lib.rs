//! Search integration layer for the TaskHub task-management platform.
//!
//! - [`search`]: query building and execution with per-call deadlines
//! - [`index`]: index lifecycle and bulk ingestion
//! - [`circuit_breaker`]: rolling-window breaker guarding the query path
//! - [`engine`]: the `SearchEngine` capability trait and its HTTP client
//! - [`orchestrator`]: the single entry point wiring them together

pub mod circuit_breaker;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod orchestrator;
pub mod search;

pub use self::config::Config;
pub use error::{AppError, Result};
pub use orchestrator::{SearchOrchestrator, SearchSettings};
