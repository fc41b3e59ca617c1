//! Engine connection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for the search engine cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Node base URLs, tried in round-robin order
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Basic auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// API key, sent as `Authorization: ApiKey <key>`; wins over basic auth
    #[serde(default)]
    pub api_key: Option<String>,

    /// PEM bundle with extra trusted CA certificates
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    /// Skip TLS certificate verification (development clusters only)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Default request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Timeout for bulk writes and synchronous reindex in milliseconds
    #[serde(default = "default_long_request_timeout_ms")]
    pub long_request_timeout_ms: u64,

    /// Connection-level retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Replace `nodes` with the cluster's published HTTP addresses on startup
    #[serde(default)]
    pub sniff_on_start: bool,
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn long_request_timeout(&self) -> Duration {
        Duration::from_millis(self.long_request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            username: None,
            password: None,
            api_key: None,
            ca_cert_path: None,
            accept_invalid_certs: false,
            request_timeout_ms: default_request_timeout_ms(),
            long_request_timeout_ms: default_long_request_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            sniff_on_start: false,
        }
    }
}

fn default_nodes() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_long_request_timeout_ms() -> u64 {
    600_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}
