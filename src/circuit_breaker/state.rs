//! Circuit breaker state machine implementation.
//!
//! This module handles state transitions and state-specific behavior.

use crate::circuit_breaker::window::{RollingWindow, WindowCounts};
use crate::circuit_breaker::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// The current state of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    /// Circuit is closed - requests are allowed through, outcomes are counted
    Closed,
    /// Circuit is open - all requests are rejected until the cooldown elapses
    Open,
    /// Circuit is half-open - a single trial decides whether to close again
    HalfOpen,
}

impl CircuitBreakerState {
    /// Convert state to numeric value for Prometheus gauge
    pub fn to_metric_value(&self) -> f64 {
        match self {
            CircuitBreakerState::Closed => 0.0,
            CircuitBreakerState::Open => 1.0,
            CircuitBreakerState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerState::Closed => write!(f, "closed"),
            CircuitBreakerState::Open => write!(f, "open"),
            CircuitBreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Represents a state transition in the circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state
    pub from: CircuitBreakerState,
    /// New state
    pub to: CircuitBreakerState,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
    /// Reason for the transition
    pub reason: String,
}

impl StateTransition {
    /// Create a new state transition
    pub fn new(from: CircuitBreakerState, to: CircuitBreakerState, reason: String) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
            reason,
        }
    }
}

/// Internal state data for the circuit breaker
#[derive(Debug, Clone)]
pub struct StateData {
    /// Current state
    pub state: CircuitBreakerState,
    /// Outcomes recorded while closed
    pub window: RollingWindow,
    /// When the circuit was opened (if in Open state)
    pub opened_at: Option<Instant>,
    /// Trials currently admitted in HalfOpen state
    pub half_open_in_flight: u32,
    /// When the state was last changed
    pub last_state_change: DateTime<Utc>,
    /// Total number of state transitions
    pub transition_count: u64,
}

impl StateData {
    /// Create new state data in Closed state
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            window: RollingWindow::new(config.bucket_width(), config.rolling_buckets),
            opened_at: None,
            half_open_in_flight: 0,
            last_state_change: Utc::now(),
            transition_count: 0,
        }
    }

    /// Counts inside the rolling window at `now`
    pub fn counts(&self, now: Instant) -> WindowCounts {
        self.window.counts(now)
    }

    /// Whether the closed-state window has crossed the configured error rate
    pub fn should_trip(&self, config: &CircuitBreakerConfig, now: Instant) -> bool {
        let counts = self.window.counts(now);
        counts.total() >= config.volume_threshold
            && counts.error_percentage() > config.error_threshold_percentage
    }

    /// Check if enough time has passed to transition from Open to HalfOpen
    pub fn cooldown_elapsed(&self, config: &CircuitBreakerConfig, now: Instant) -> bool {
        match (self.state, self.opened_at) {
            (CircuitBreakerState::Open, Some(opened_at)) => {
                now.saturating_duration_since(opened_at) >= config.cooldown
            }
            _ => false,
        }
    }

    /// Transition to a new state
    pub fn transition_to(
        &mut self,
        new_state: CircuitBreakerState,
        config: &CircuitBreakerConfig,
        now: Instant,
    ) -> StateTransition {
        let transition = StateTransition::new(
            self.state,
            new_state,
            self.transition_reason(new_state, config, now),
        );

        self.state = new_state;
        self.last_state_change = Utc::now();
        self.transition_count += 1;
        self.half_open_in_flight = 0;

        match new_state {
            CircuitBreakerState::Open => self.opened_at = Some(now),
            CircuitBreakerState::HalfOpen => {}
            CircuitBreakerState::Closed => {
                self.opened_at = None;
                self.window.clear();
            }
        }

        transition
    }

    /// Get a human-readable reason for the state transition
    fn transition_reason(
        &self,
        new_state: CircuitBreakerState,
        config: &CircuitBreakerConfig,
        now: Instant,
    ) -> String {
        match (self.state, new_state) {
            (CircuitBreakerState::Closed, CircuitBreakerState::Open) => {
                let counts = self.window.counts(now);
                format!(
                    "Error rate {:.1}% over {} calls exceeded {:.1}%",
                    counts.error_percentage(),
                    counts.total(),
                    config.error_threshold_percentage
                )
            }
            (CircuitBreakerState::Open, CircuitBreakerState::HalfOpen) => {
                "Cooldown elapsed, admitting trial".to_string()
            }
            (CircuitBreakerState::HalfOpen, CircuitBreakerState::Closed) => {
                "Trial succeeded".to_string()
            }
            (CircuitBreakerState::HalfOpen, CircuitBreakerState::Open) => {
                "Trial failed, restarting cooldown".to_string()
            }
            _ => format!("Transitioned from {} to {}", self.state, new_state),
        }
    }
}
