//! Core circuit breaker implementation with async support.

use crate::circuit_breaker::{
    CallError, CircuitBreakerConfig, CircuitBreakerState, StateData, StateTransition,
};
use crate::metrics::METRICS;
use parking_lot::Mutex;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A thread-safe, async circuit breaker driven by a rolling error rate
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Unique name for this circuit breaker
    name: String,
    /// Configuration
    config: CircuitBreakerConfig,
    /// Internal state
    state: Mutex<StateData>,
}

/// Admission granted to one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Normal,
    Trial,
}

/// Releases a half-open trial slot if the call future is dropped early
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.breaker.state.lock();
            if state.state == CircuitBreakerState::HalfOpen {
                state.half_open_in_flight = state.half_open_in_flight.saturating_sub(1);
            }
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            name = %name,
            config = ?config,
            "Creating new circuit breaker"
        );

        Self {
            state: Mutex::new(StateData::new(&config)),
            name,
            config,
        }
    }

    /// Get the name of this circuit breaker
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state
    pub fn state(&self) -> CircuitBreakerState {
        self.state.lock().state
    }

    /// Get the current configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an async operation protected by the circuit breaker.
    ///
    /// Every `Err` returned by the operation counts as a failure. When the
    /// circuit is open the operation is never invoked.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire().ok_or_else(|| CallError::Rejected {
            name: self.name.clone(),
        })?;

        METRICS
            .breaker_calls
            .with_label_values(&[&self.name, "allowed"])
            .inc();

        let mut guard = TrialGuard {
            breaker: self,
            armed: permit == Permit::Trial,
        };

        let result = f().await;
        guard.armed = false;

        match result {
            Ok(value) => {
                self.on_success(permit);
                METRICS
                    .breaker_outcomes
                    .with_label_values(&[&self.name, "success"])
                    .inc();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(permit);
                METRICS
                    .breaker_outcomes
                    .with_label_values(&[&self.name, "failure"])
                    .inc();
                Err(CallError::Failed(err))
            }
        }
    }

    /// Admit or reject a call, moving Open to HalfOpen once the cooldown has elapsed
    fn acquire(&self) -> Option<Permit> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if state.cooldown_elapsed(&self.config, now) {
            let transition = state.transition_to(CircuitBreakerState::HalfOpen, &self.config, now);
            self.log_transition(&transition);
        }

        match state.state {
            CircuitBreakerState::Closed => Some(Permit::Normal),
            CircuitBreakerState::HalfOpen
                if state.half_open_in_flight < self.config.half_open_max_requests =>
            {
                state.half_open_in_flight += 1;
                debug!(name = %self.name, "Admitting half-open trial");
                Some(Permit::Trial)
            }
            CircuitBreakerState::Open | CircuitBreakerState::HalfOpen => {
                METRICS
                    .breaker_calls
                    .with_label_values(&[&self.name, "rejected"])
                    .inc();
                None
            }
        }
    }

    /// Handle successful operation
    fn on_success(&self, permit: Permit) {
        let now = Instant::now();
        let mut state = self.state.lock();

        match (state.state, permit) {
            (CircuitBreakerState::HalfOpen, Permit::Trial) => {
                let transition = state.transition_to(CircuitBreakerState::Closed, &self.config, now);
                self.log_transition(&transition);
            }
            (CircuitBreakerState::Closed, _) => state.window.record_success(now),
            // Late result from a call admitted before the state changed
            _ => {}
        }
    }

    /// Handle failed operation
    fn on_failure(&self, permit: Permit) {
        let now = Instant::now();
        let mut state = self.state.lock();

        match (state.state, permit) {
            (CircuitBreakerState::HalfOpen, Permit::Trial) => {
                let transition = state.transition_to(CircuitBreakerState::Open, &self.config, now);
                self.log_transition(&transition);
            }
            (CircuitBreakerState::Closed, _) => {
                state.window.record_failure(now);
                let counts = state.counts(now);

                warn!(
                    name = %self.name,
                    failures = counts.failures,
                    total = counts.total(),
                    "Operation failed"
                );

                if state.should_trip(&self.config, now) {
                    let transition = state.transition_to(CircuitBreakerState::Open, &self.config, now);
                    self.log_transition(&transition);
                }
            }
            _ => {}
        }
    }

    /// Log and record state transition
    fn log_transition(&self, transition: &StateTransition) {
        info!(
            name = %self.name,
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "Circuit breaker state transition"
        );

        METRICS
            .breaker_state
            .with_label_values(&[&self.name])
            .set(transition.to.to_metric_value());

        METRICS
            .breaker_transitions
            .with_label_values(&[&self.name, &transition.from.to_string(), &transition.to.to_string()])
            .inc();
    }

    /// Get statistics for this circuit breaker
    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state.lock();
        let counts = state.counts(Instant::now());
        CircuitBreakerStats {
            name: self.name.clone(),
            state: state.state,
            window_calls: counts.total(),
            window_failures: counts.failures,
            error_percentage: counts.error_percentage(),
            transition_count: state.transition_count,
            last_state_change: state.last_state_change,
        }
    }
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitBreakerState,
    pub window_calls: u32,
    pub window_failures: u32,
    pub error_percentage: f64,
    pub transition_count: u64,
    pub last_state_change: chrono::DateTime<chrono::Utc>,
}
