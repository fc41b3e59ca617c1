//! Circuit breaker configuration with builder pattern.

use crate::circuit_breaker::CircuitBreakerError;
use std::time::Duration;

/// Configuration for a failure-rate circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Error rate (percent) within the rolling window above which the circuit opens
    pub error_threshold_percentage: f64,

    /// Minimum number of calls in the rolling window before the rate is evaluated
    pub volume_threshold: u32,

    /// Length of the rolling window
    pub rolling_window: Duration,

    /// Number of buckets the rolling window is split into
    pub rolling_buckets: u32,

    /// How long an open circuit rejects calls before admitting a trial
    pub cooldown: Duration,

    /// Concurrent trial calls admitted while half-open
    pub half_open_max_requests: u32,
}

impl CircuitBreakerConfig {
    /// Create a new builder for CircuitBreakerConfig
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// Width of a single rolling-window bucket
    pub fn bucket_width(&self) -> Duration {
        self.rolling_window / self.rolling_buckets.max(1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), CircuitBreakerError> {
        if !(self.error_threshold_percentage > 0.0 && self.error_threshold_percentage <= 100.0) {
            return Err(CircuitBreakerError::InvalidConfig(
                "error_threshold_percentage must be in (0, 100]".to_string(),
            ));
        }

        if self.volume_threshold == 0 {
            return Err(CircuitBreakerError::InvalidConfig(
                "volume_threshold must be greater than 0".to_string(),
            ));
        }

        if self.rolling_buckets == 0 {
            return Err(CircuitBreakerError::InvalidConfig(
                "rolling_buckets must be greater than 0".to_string(),
            ));
        }

        if self.bucket_width().is_zero() {
            return Err(CircuitBreakerError::InvalidConfig(
                "rolling_window must be at least one millisecond per bucket".to_string(),
            ));
        }

        if self.cooldown.is_zero() {
            return Err(CircuitBreakerError::InvalidConfig(
                "cooldown must be greater than 0".to_string(),
            ));
        }

        if self.half_open_max_requests == 0 {
            return Err(CircuitBreakerError::InvalidConfig(
                "half_open_max_requests must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            volume_threshold: 10,
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            cooldown: Duration::from_secs(30),
            half_open_max_requests: 1,
        }
    }
}

/// Builder for CircuitBreakerConfig with fluent API
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerConfigBuilder {
    error_threshold_percentage: Option<f64>,
    volume_threshold: Option<u32>,
    rolling_window: Option<Duration>,
    rolling_buckets: Option<u32>,
    cooldown: Option<Duration>,
    half_open_max_requests: Option<u32>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the error-rate threshold in percent
    pub fn error_threshold_percentage(mut self, percentage: f64) -> Self {
        self.error_threshold_percentage = Some(percentage);
        self
    }

    /// Set the minimum call volume
    pub fn volume_threshold(mut self, threshold: u32) -> Self {
        self.volume_threshold = Some(threshold);
        self
    }

    /// Set the rolling window length
    pub fn rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window = Some(window);
        self
    }

    /// Set the number of rolling window buckets
    pub fn rolling_buckets(mut self, buckets: u32) -> Self {
        self.rolling_buckets = Some(buckets);
        self
    }

    /// Set the open-state cooldown
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    /// Set the maximum trials in half-open state
    pub fn half_open_max_requests(mut self, max: u32) -> Self {
        self.half_open_max_requests = Some(max);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<CircuitBreakerConfig, CircuitBreakerError> {
        let default = CircuitBreakerConfig::default();

        let config = CircuitBreakerConfig {
            error_threshold_percentage: self
                .error_threshold_percentage
                .unwrap_or(default.error_threshold_percentage),
            volume_threshold: self.volume_threshold.unwrap_or(default.volume_threshold),
            rolling_window: self.rolling_window.unwrap_or(default.rolling_window),
            rolling_buckets: self.rolling_buckets.unwrap_or(default.rolling_buckets),
            cooldown: self.cooldown.unwrap_or(default.cooldown),
            half_open_max_requests: self
                .half_open_max_requests
                .unwrap_or(default.half_open_max_requests),
        };

        config.validate()?;
        Ok(config)
    }
}
