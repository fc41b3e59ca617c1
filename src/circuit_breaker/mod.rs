//! Failure-rate circuit breaker guarding the query path.
//!
//! The breaker tracks call outcomes in a bucketed rolling window and opens
//! when the error rate crosses a threshold after a minimum call volume:
//!
//! - **Closed**: calls pass through, outcomes are recorded
//! - **Open**: calls are rejected without being invoked until the cooldown elapses
//! - **Half-Open**: one trial is admitted; success closes the circuit, failure reopens it
//!
//! Breakers are plain values owned by whoever constructs them (usually the
//! [`SearchOrchestrator`](crate::orchestrator::SearchOrchestrator)); there is
//! no global registry.
//!
//! # Example
//!
//! ```no_run
//! use taskhub_search::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CircuitBreakerConfig::builder()
//!         .error_threshold_percentage(50.0)
//!         .cooldown(Duration::from_secs(30))
//!         .build()?;
//!
//!     let breaker = CircuitBreaker::new("search", config);
//!
//!     let result = breaker
//!         .call(|| async { Ok::<_, std::io::Error>(42) })
//!         .await;
//!
//!     assert!(result.is_ok());
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod state;
mod window;

pub use self::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use self::core::{CircuitBreaker, CircuitBreakerStats};
pub use state::{CircuitBreakerState, StateData, StateTransition};
pub use window::{RollingWindow, WindowCounts};

use crate::error::AppError;

/// Result type for circuit breaker configuration
pub type CircuitBreakerResult<T> = std::result::Result<T, CircuitBreakerError>;

/// Errors that can occur while configuring a circuit breaker
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError {
    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Outcome of a call that did not succeed
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    /// Circuit is open; the operation was never invoked
    #[error("Circuit breaker is open for '{name}'")]
    Rejected { name: String },

    /// The operation ran and failed
    #[error("{0}")]
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallError::Rejected { .. })
    }
}

impl From<CircuitBreakerError> for AppError {
    fn from(err: CircuitBreakerError) -> Self {
        match err {
            CircuitBreakerError::InvalidConfig(msg) => AppError::Configuration(msg),
        }
    }
}
