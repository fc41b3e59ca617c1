//! Query execution configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A full-text field and its relevance weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedField {
    pub name: String,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

impl WeightedField {
    pub fn new(name: impl Into<String>, boost: f32) -> Self {
        Self {
            name: name.into(),
            boost,
        }
    }

    /// Field reference in engine syntax (`title^3`)
    pub fn to_query_field(&self) -> String {
        if (self.boost - 1.0).abs() < f32::EPSILON {
            self.name.clone()
        } else {
            format!("{}^{}", self.name, self.boost)
        }
    }
}

/// Query execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Timeout budget for simple queries in milliseconds
    #[serde(default = "default_simple_timeout_ms")]
    pub simple_timeout_ms: u64,

    /// Timeout budget for complex queries in milliseconds
    #[serde(default = "default_complex_timeout_ms")]
    pub complex_timeout_ms: u64,

    /// Extra time the client waits beyond the engine-side budget
    #[serde(default = "default_client_grace_ms")]
    pub client_grace_ms: u64,

    /// Queries longer than this many characters are complex
    #[serde(default = "default_complex_length")]
    pub complex_length: usize,

    /// Upper bound for `pagination.limit`, matching the engine's max result window
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u64,

    /// Fields matched (and highlighted) by full-text queries
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<WeightedField>,

    /// Name of the breaker guarding the query path
    #[serde(default = "default_breaker_name")]
    pub breaker_name: String,
}

impl QuerySettings {
    pub fn simple_timeout(&self) -> Duration {
        Duration::from_millis(self.simple_timeout_ms)
    }

    pub fn complex_timeout(&self) -> Duration {
        Duration::from_millis(self.complex_timeout_ms)
    }

    pub fn client_grace(&self) -> Duration {
        Duration::from_millis(self.client_grace_ms)
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            simple_timeout_ms: default_simple_timeout_ms(),
            complex_timeout_ms: default_complex_timeout_ms(),
            client_grace_ms: default_client_grace_ms(),
            complex_length: default_complex_length(),
            max_result_window: default_max_result_window(),
            text_fields: default_text_fields(),
            breaker_name: default_breaker_name(),
        }
    }
}

fn default_boost() -> f32 {
    1.0
}

fn default_simple_timeout_ms() -> u64 {
    200
}

fn default_complex_timeout_ms() -> u64 {
    500
}

fn default_client_grace_ms() -> u64 {
    250
}

fn default_complex_length() -> usize {
    100
}

fn default_max_result_window() -> u64 {
    10_000
}

fn default_text_fields() -> Vec<WeightedField> {
    vec![
        WeightedField::new("title", 3.0),
        WeightedField::new("description", 1.0),
    ]
}

fn default_breaker_name() -> String {
    "search-query".to_string()
}
