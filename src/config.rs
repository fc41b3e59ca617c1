use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerResult};
use crate::engine::EngineConfig;
use crate::error::AppError;
use crate::index::IndexDefaults;
use crate::search::QuerySettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "TASKHUB_SEARCH_CONFIG";

/// Prefix for environment overrides (`TASKHUB_SEARCH_ENGINE__NODES`)
pub const ENV_PREFIX: &str = "TASKHUB_SEARCH";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine connection
    #[serde(default)]
    pub engine: EngineConfig,

    /// Query execution
    #[serde(default)]
    pub query: QuerySettings,

    /// Index creation defaults and bounds
    #[serde(default)]
    pub index: IndexDefaults,

    /// Circuit breaker guarding the query path
    #[serde(default)]
    pub breaker: BreakerSettings,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, `$TASKHUB_SEARCH_CONFIG` and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(path.as_deref(), ENV_PREFIX)
    }

    /// Load with an explicit override file and environment prefix
    pub fn load_from(path: Option<&Path>, env_prefix: &str) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("engine.nodes"),
            )
            .build()?
            .try_deserialize()
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), AppError> {
        if self.engine.nodes.is_empty() {
            return Err(AppError::Configuration("engine.nodes must not be empty".to_string()));
        }
        if self.query.simple_timeout_ms == 0 || self.query.complex_timeout_ms == 0 {
            return Err(AppError::Configuration("query timeouts must be positive".to_string()));
        }
        if self.query.text_fields.is_empty() {
            return Err(AppError::Configuration("query.text_fields must not be empty".to_string()));
        }
        if self.index.number_of_shards > self.index.max_shards
            || self.index.number_of_replicas > self.index.max_replicas
        {
            return Err(AppError::Configuration(
                "index defaults exceed the configured shard or replica bounds".to_string(),
            ));
        }
        self.breaker.to_breaker_config()?;
        Ok(())
    }
}

/// Circuit breaker knobs in config-file form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Trip when the error rate exceeds this percentage
    #[serde(default = "default_error_threshold_percentage")]
    pub error_threshold_percentage: f64,

    /// Minimum calls in the window before the rate is considered
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u32,

    #[serde(default = "default_rolling_window_ms")]
    pub rolling_window_ms: u64,

    #[serde(default = "default_rolling_buckets")]
    pub rolling_buckets: u32,

    /// Time an open circuit rejects calls before probing
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    #[serde(default = "default_half_open_max_requests")]
    pub half_open_max_requests: u32,
}

impl BreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerResult<CircuitBreakerConfig> {
        CircuitBreakerConfig::builder()
            .error_threshold_percentage(self.error_threshold_percentage)
            .volume_threshold(self.volume_threshold)
            .rolling_window(Duration::from_millis(self.rolling_window_ms))
            .rolling_buckets(self.rolling_buckets)
            .cooldown(Duration::from_millis(self.cooldown_ms))
            .half_open_max_requests(self.half_open_max_requests)
            .build()
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            error_threshold_percentage: default_error_threshold_percentage(),
            volume_threshold: default_volume_threshold(),
            rolling_window_ms: default_rolling_window_ms(),
            rolling_buckets: default_rolling_buckets(),
            cooldown_ms: default_cooldown_ms(),
            half_open_max_requests: default_half_open_max_requests(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_error_threshold_percentage() -> f64 {
    50.0
}

fn default_volume_threshold() -> u32 {
    10
}

fn default_rolling_window_ms() -> u64 {
    10_000
}

fn default_rolling_buckets() -> u32 {
    10
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_half_open_max_requests() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}
