//! HTTP implementation of the engine adapter

use crate::engine::config::EngineConfig;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{
    AliasAction, BulkItemResult, BulkOperation, HealthStatus, Mappings, QueryResponse, RawSearchResponse,
    Refresh, ReindexResponse, Settings,
};
use crate::engine::SearchEngine;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request payload variants understood by the engine
enum Body<'a> {
    Empty,
    Json(&'a Value),
    NdJson(String),
}

/// Elasticsearch/OpenSearch client speaking the REST protocol
pub struct ElasticClient {
    http: Client,
    nodes: RwLock<Vec<String>>,
    cursor: AtomicUsize,
    config: EngineConfig,
}

impl ElasticClient {
    /// Create a client from connection configuration
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        if config.nodes.is_empty() {
            return Err(EngineError::Configuration(
                "at least one engine node is required".to_string(),
            ));
        }

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node in &config.nodes {
            reqwest::Url::parse(node)
                .map_err(|e| EngineError::Configuration(format!("invalid node url '{}': {}", node, e)))?;
            nodes.push(node.trim_end_matches('/').to_string());
        }

        let mut builder = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("taskhub-search/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                EngineError::Configuration(format!("failed to read CA bundle {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| EngineError::Configuration(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| EngineError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            nodes: RwLock::new(nodes),
            cursor: AtomicUsize::new(0),
            config,
        })
    }

    /// Create a client and, when configured, discover the cluster's nodes
    pub async fn connect(config: EngineConfig) -> EngineResult<Self> {
        let sniff = config.sniff_on_start;
        let client = Self::new(config)?;
        if sniff {
            client.discover_nodes().await?;
        }
        Ok(client)
    }

    /// Currently known node URLs
    pub fn nodes(&self) -> Vec<String> {
        self.nodes.read().clone()
    }

    /// Replace the node list with the HTTP addresses the cluster publishes
    pub async fn discover_nodes(&self) -> EngineResult<Vec<String>> {
        #[derive(Deserialize)]
        struct NodesInfo {
            #[serde(default)]
            nodes: HashMap<String, NodeInfo>,
        }

        #[derive(Deserialize)]
        struct NodeInfo {
            http: Option<NodeHttp>,
        }

        #[derive(Deserialize)]
        struct NodeHttp {
            publish_address: String,
        }

        let body = self.call(Method::GET, "/_nodes/http", Body::Empty, None).await?;
        let info: NodesInfo = serde_json::from_str(&body)?;

        let scheme = if self.nodes.read().iter().any(|n| n.starts_with("https://")) {
            "https"
        } else {
            "http"
        };

        let mut discovered: Vec<String> = info
            .nodes
            .values()
            .filter_map(|node| node.http.as_ref())
            .map(|http| {
                // "hostname/10.0.0.1:9200" -> "10.0.0.1:9200"
                let addr = http
                    .publish_address
                    .rsplit('/')
                    .next()
                    .unwrap_or(&http.publish_address);
                format!("{}://{}", scheme, addr)
            })
            .collect();
        discovered.sort();

        if discovered.is_empty() {
            warn!("Node discovery returned no HTTP nodes, keeping configured nodes");
            return Ok(self.nodes());
        }

        info!(nodes = ?discovered, "Discovered engine nodes");
        *self.nodes.write() = discovered.clone();
        Ok(discovered)
    }

    fn next_node(&self) -> String {
        let nodes = self.nodes.read();
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % nodes.len();
        nodes[idx].clone()
    }

    /// Send a request, retrying connection-level failures on the next node
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: &Body<'_>,
        timeout: Option<Duration>,
    ) -> EngineResult<Response> {
        let timeout = timeout.unwrap_or_else(|| self.config.request_timeout());
        let mut attempt = 0;

        loop {
            let url = format!("{}{}", self.next_node(), path);
            let mut request = self.http.request(method.clone(), &url).timeout(timeout);

            request = match (&self.config.api_key, &self.config.username) {
                (Some(key), _) => request.header("Authorization", format!("ApiKey {}", key)),
                (None, Some(user)) => request.basic_auth(user, self.config.password.as_deref()),
                (None, None) => request,
            };

            request = match body {
                Body::Empty => request,
                Body::Json(value) => request.json(value),
                Body::NdJson(payload) => request
                    .header("Content-Type", "application/x-ndjson")
                    .body(payload.clone()),
            };

            let err = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !matches!(status, 502..=504) || attempt >= self.config.max_retries {
                        return Ok(response);
                    }
                    let text = response.text().await.unwrap_or_default();
                    EngineError::from_response(status, &text)
                }
                Err(e) => EngineError::from_reqwest(e, timeout),
            };

            if !err.is_retryable() || attempt >= self.config.max_retries {
                return Err(err);
            }

            attempt += 1;
            warn!(
                method = %method,
                url = %url,
                attempt = attempt,
                error = %err,
                "Engine request failed, retrying on next node"
            );
            tokio::time::sleep(self.config.retry_backoff()).await;
        }
    }

    /// Send a request and return the body of a successful response
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Body<'_>,
        timeout: Option<Duration>,
    ) -> EngineResult<String> {
        let effective_timeout = timeout.unwrap_or_else(|| self.config.request_timeout());
        let response = self.send(method.clone(), path, &body, timeout).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::from_reqwest(e, effective_timeout))?;

        debug!(method = %method, path = %path, status = status.as_u16(), "Engine response");

        if !status.is_success() {
            return Err(EngineError::from_response(status.as_u16(), &text));
        }
        Ok(text)
    }
}

#[async_trait]
impl SearchEngine for ElasticClient {
    async fn health(&self, index: Option<&str>) -> EngineResult<HealthStatus> {
        #[derive(Deserialize)]
        struct Health {
            status: HealthStatus,
        }

        let path = match index {
            Some(name) => format!("/_cluster/health/{}", name),
            None => "/_cluster/health".to_string(),
        };
        let body = self.call(Method::GET, &path, Body::Empty, None).await?;
        let health: Health = serde_json::from_str(&body)?;
        Ok(health.status)
    }

    async fn index_exists(&self, name: &str) -> EngineResult<bool> {
        let response = self
            .send(Method::HEAD, &format!("/{}", name), &Body::Empty, None)
            .await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(EngineError::from_response(status.as_u16(), "")),
        }
    }

    async fn create_index(
        &self,
        name: &str,
        settings: &Settings,
        mappings: &Mappings,
        aliases: &[String],
    ) -> EngineResult<()> {
        let aliases: Map<String, Value> = aliases
            .iter()
            .map(|alias| (alias.clone(), json!({})))
            .collect();
        let body = json!({
            "settings": settings,
            "mappings": mappings,
            "aliases": aliases,
        });
        self.call(Method::PUT, &format!("/{}", name), Body::Json(&body), None)
            .await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> EngineResult<()> {
        self.call(Method::DELETE, &format!("/{}", name), Body::Empty, None)
            .await?;
        Ok(())
    }

    async fn get_aliases(&self, name: &str) -> EngineResult<BTreeSet<String>> {
        #[derive(Deserialize)]
        struct IndexAliases {
            #[serde(default)]
            aliases: Map<String, Value>,
        }

        let body = self
            .call(Method::GET, &format!("/{}/_alias", name), Body::Empty, None)
            .await?;
        let indices: HashMap<String, IndexAliases> = serde_json::from_str(&body)?;
        Ok(indices
            .into_values()
            .flat_map(|entry| entry.aliases.into_iter().map(|(alias, _)| alias))
            .collect())
    }

    async fn alias_holders(&self, alias: &str) -> EngineResult<BTreeSet<String>> {
        match self
            .call(Method::GET, &format!("/_alias/{}", alias), Body::Empty, None)
            .await
        {
            Ok(body) => {
                let indices: HashMap<String, Value> = serde_json::from_str(&body)?;
                Ok(indices.into_keys().collect())
            }
            Err(EngineError::Api { status: 404, .. }) => Ok(BTreeSet::new()),
            Err(err) => Err(err),
        }
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> EngineResult<()> {
        let body = json!({ "actions": actions });
        self.call(Method::POST, "/_aliases", Body::Json(&body), None)
            .await?;
        Ok(())
    }

    async fn get_settings(&self, name: &str) -> EngineResult<Settings> {
        #[derive(Deserialize)]
        struct IndexSettings {
            #[serde(default)]
            settings: Settings,
        }

        let body = self
            .call(Method::GET, &format!("/{}/_settings", name), Body::Empty, None)
            .await?;
        let mut indices: HashMap<String, IndexSettings> = serde_json::from_str(&body)?;
        let settings = match indices.remove(name) {
            Some(entry) => entry.settings,
            // `name` may be an alias; the response is keyed by the physical index
            None => indices
                .into_values()
                .next()
                .map(|entry| entry.settings)
                .unwrap_or_default(),
        };
        Ok(settings)
    }

    async fn put_settings(&self, name: &str, settings: &Settings) -> EngineResult<()> {
        let body = Value::Object(settings.clone());
        self.call(Method::PUT, &format!("/{}/_settings", name), Body::Json(&body), None)
            .await?;
        Ok(())
    }

    async fn bulk_write(
        &self,
        index: &str,
        ops: &[BulkOperation],
        refresh: Refresh,
    ) -> EngineResult<Vec<BulkItemResult>> {
        #[derive(Deserialize)]
        struct BulkResponse {
            #[serde(default)]
            items: Vec<HashMap<String, BulkItemResult>>,
        }

        let mut payload = String::new();
        for op in ops {
            payload.push_str(&op.action_line().to_string());
            payload.push('\n');
            payload.push_str(&op.document.to_string());
            payload.push('\n');
        }

        let path = format!("/{}/_bulk?refresh={}", index, refresh);
        let body = self
            .call(
                Method::POST,
                &path,
                Body::NdJson(payload),
                Some(self.config.long_request_timeout()),
            )
            .await?;
        let response: BulkResponse = serde_json::from_str(&body)?;

        // Each item is keyed by its operation type ("index", "create", ...)
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.into_values().next())
            .collect())
    }

    async fn reindex(&self, source: &str, dest: &str) -> EngineResult<ReindexResponse> {
        let body = json!({
            "source": { "index": source },
            "dest": { "index": dest },
        });
        let text = self
            .call(
                Method::POST,
                "/_reindex?wait_for_completion=true&refresh=true",
                Body::Json(&body),
                Some(self.config.long_request_timeout()),
            )
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn query(&self, index: &str, body: &Value, timeout: Duration) -> EngineResult<QueryResponse> {
        let text = self
            .call(
                Method::POST,
                &format!("/{}/_search", index),
                Body::Json(body),
                Some(timeout),
            )
            .await?;
        let raw: RawSearchResponse = serde_json::from_str(&text)?;
        Ok(raw.into())
    }
}
