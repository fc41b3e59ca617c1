//! Shared test utilities: an in-memory `SearchEngine`
//!
//! The fake records every call so tests can assert on what reached the
//! engine, and exposes knobs for the failure modes the search layer must
//! handle.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use taskhub_search::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use taskhub_search::engine::{
    AliasAction, BulkItemResult, BulkOperation, EngineError, EngineHit, EngineResult, HealthStatus,
    ItemError, Mappings, QueryResponse, Refresh, ReindexFailure, ReindexResponse, SearchEngine,
    Settings,
};
use taskhub_search::{SearchOrchestrator, SearchSettings};

/// One call that reached the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Health(Option<String>),
    IndexExists(String),
    CreateIndex {
        name: String,
        settings: Settings,
        aliases: Vec<String>,
    },
    DeleteIndex(String),
    GetAliases(String),
    AliasHolders(String),
    UpdateAliases(Vec<AliasAction>),
    GetSettings(String),
    PutSettings {
        name: String,
        settings: Settings,
    },
    BulkWrite {
        index: String,
        documents: usize,
        refresh: Refresh,
    },
    Reindex {
        source: String,
        dest: String,
    },
    Query {
        index: String,
        body: Value,
        timeout: Duration,
    },
}

/// Engine calls that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    AliasHolders,
    UpdateAliases,
    Reindex,
}

/// How the fake answers queries
#[derive(Debug, Clone)]
pub enum QueryBehavior {
    /// Return these hits; `total` defaults to the hit count
    Hits { hits: Vec<EngineHit>, total: Option<u64> },
    /// Return an empty page flagged as timed out
    EngineTimedOut,
    /// Fail with an engine API error
    Api { status: u16, error_type: String },
    /// Fail as if the node were unreachable
    Transport,
    /// Never answer
    Hang,
}

#[derive(Debug, Clone, Default)]
pub struct FakeIndex {
    pub settings: Settings,
    pub mappings: Mappings,
    pub aliases: BTreeSet<String>,
    pub documents: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct FakeState {
    indices: BTreeMap<String, FakeIndex>,
    health: VecDeque<HealthStatus>,
    default_health: HealthStatus,
    query: QueryBehavior,
    failing_batches: HashSet<usize>,
    bulk_batches_seen: usize,
    reindex_failures: Vec<ReindexFailure>,
    undeletable: HashSet<String>,
    fail_points: HashSet<FailPoint>,
    next_auto_id: u64,
}

/// In-memory engine with call recording
pub struct FakeEngine {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<Call>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                indices: BTreeMap::new(),
                health: VecDeque::new(),
                default_health: HealthStatus::Green,
                query: QueryBehavior::Hits {
                    hits: Vec::new(),
                    total: None,
                },
                failing_batches: HashSet::new(),
                bulk_batches_seen: 0,
                reindex_failures: Vec::new(),
                undeletable: HashSet::new(),
                fail_points: HashSet::new(),
                next_auto_id: 0,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Seed an index with documents and aliases
    pub fn with_index(self, name: &str, aliases: &[&str], documents: Vec<Value>) -> Self {
        {
            let mut state = self.state.lock();
            let index = state.indices.entry(name.to_string()).or_default();
            index.aliases.extend(aliases.iter().map(|a| a.to_string()));
            for (i, doc) in documents.into_iter().enumerate() {
                let id = doc
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("seed-{}", i));
                index.documents.insert(id, doc);
            }
        }
        self
    }

    pub fn set_query_behavior(&self, behavior: QueryBehavior) {
        self.state.lock().query = behavior;
    }

    /// Health answers returned in order before falling back to the default
    pub fn queue_health(&self, statuses: &[HealthStatus]) {
        self.state.lock().health.extend(statuses.iter().copied());
    }

    pub fn set_default_health(&self, status: HealthStatus) {
        self.state.lock().default_health = status;
    }

    /// Make the n-th bulk request (0-based) fail as a whole
    pub fn fail_batch(&self, n: usize) {
        self.state.lock().failing_batches.insert(n);
    }

    pub fn set_reindex_failures(&self, failures: Vec<ReindexFailure>) {
        self.state.lock().reindex_failures = failures;
    }

    pub fn make_undeletable(&self, name: &str) {
        self.state.lock().undeletable.insert(name.to_string());
    }

    /// Make every later call of this kind fail with a server error
    pub fn fail_on(&self, point: FailPoint) {
        self.state.lock().fail_points.insert(point);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn query_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Query { .. }))
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    pub fn index(&self, name: &str) -> Option<FakeIndex> {
        self.state.lock().indices.get(name).cloned()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().indices.keys().cloned().collect()
    }

    /// Physical indexes the alias points at
    pub fn alias_targets(&self, alias: &str) -> Vec<String> {
        self.state
            .lock()
            .indices
            .iter()
            .filter(|(_, idx)| idx.aliases.contains(alias))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

fn api_error(status: u16, error_type: &str, reason: &str) -> EngineError {
    EngineError::Api {
        status,
        error_type: error_type.to_string(),
        reason: reason.to_string(),
    }
}

fn injected(state: &FakeState, point: FailPoint) -> EngineResult<()> {
    if state.fail_points.contains(&point) {
        return Err(api_error(500, "internal_server_error", "node is shutting down"));
    }
    Ok(())
}

fn missing(name: &str) -> EngineError {
    api_error(404, "index_not_found_exception", &format!("no such index [{}]", name))
}

#[async_trait]
impl SearchEngine for FakeEngine {
    async fn health(&self, index: Option<&str>) -> EngineResult<HealthStatus> {
        self.record(Call::Health(index.map(str::to_string)));
        let mut state = self.state.lock();
        Ok(state.health.pop_front().unwrap_or(state.default_health))
    }

    async fn index_exists(&self, name: &str) -> EngineResult<bool> {
        self.record(Call::IndexExists(name.to_string()));
        let state = self.state.lock();
        Ok(state.indices.contains_key(name)
            || state.indices.values().any(|idx| idx.aliases.contains(name)))
    }

    async fn create_index(
        &self,
        name: &str,
        settings: &Settings,
        mappings: &Mappings,
        aliases: &[String],
    ) -> EngineResult<()> {
        self.record(Call::CreateIndex {
            name: name.to_string(),
            settings: settings.clone(),
            aliases: aliases.to_vec(),
        });
        let mut state = self.state.lock();
        if state.indices.contains_key(name) {
            return Err(api_error(
                400,
                "resource_already_exists_exception",
                &format!("index [{}] already exists", name),
            ));
        }
        state.indices.insert(
            name.to_string(),
            FakeIndex {
                settings: settings.clone(),
                mappings: mappings.clone(),
                aliases: aliases.iter().cloned().collect(),
                documents: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> EngineResult<()> {
        self.record(Call::DeleteIndex(name.to_string()));
        let mut state = self.state.lock();
        if state.undeletable.contains(name) {
            return Err(api_error(500, "internal_server_error", "disk is read-only"));
        }
        state.indices.remove(name).map(|_| ()).ok_or_else(|| missing(name))
    }

    async fn get_aliases(&self, name: &str) -> EngineResult<BTreeSet<String>> {
        self.record(Call::GetAliases(name.to_string()));
        let state = self.state.lock();
        state
            .indices
            .get(name)
            .map(|idx| idx.aliases.clone())
            .ok_or_else(|| missing(name))
    }

    async fn alias_holders(&self, alias: &str) -> EngineResult<BTreeSet<String>> {
        self.record(Call::AliasHolders(alias.to_string()));
        let state = self.state.lock();
        injected(&state, FailPoint::AliasHolders)?;
        Ok(state
            .indices
            .iter()
            .filter(|(_, idx)| idx.aliases.contains(alias))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> EngineResult<()> {
        self.record(Call::UpdateAliases(actions.to_vec()));
        let mut state = self.state.lock();
        injected(&state, FailPoint::UpdateAliases)?;

        // validate everything first so the update is all-or-nothing
        for action in actions {
            match action {
                AliasAction::Add { index, .. } if !state.indices.contains_key(index) => {
                    return Err(missing(index));
                }
                AliasAction::Remove { index, alias } => {
                    let holds = state
                        .indices
                        .get(index)
                        .map(|idx| idx.aliases.contains(alias))
                        .unwrap_or(false);
                    if !holds {
                        return Err(api_error(404, "aliases_not_found_exception", alias));
                    }
                }
                _ => {}
            }
        }

        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    if let Some(idx) = state.indices.get_mut(index) {
                        idx.aliases.insert(alias.clone());
                    }
                }
                AliasAction::Remove { index, alias } => {
                    if let Some(idx) = state.indices.get_mut(index) {
                        idx.aliases.remove(alias);
                    }
                }
            }
        }
        Ok(())
    }

    async fn get_settings(&self, name: &str) -> EngineResult<Settings> {
        self.record(Call::GetSettings(name.to_string()));
        let state = self.state.lock();
        state
            .indices
            .get(name)
            .map(|idx| idx.settings.clone())
            .ok_or_else(|| missing(name))
    }

    async fn put_settings(&self, name: &str, settings: &Settings) -> EngineResult<()> {
        self.record(Call::PutSettings {
            name: name.to_string(),
            settings: settings.clone(),
        });
        let mut state = self.state.lock();
        let idx = state.indices.get_mut(name).ok_or_else(|| missing(name))?;
        idx.settings.extend(settings.clone());
        Ok(())
    }

    async fn bulk_write(
        &self,
        index: &str,
        ops: &[BulkOperation],
        refresh: Refresh,
    ) -> EngineResult<Vec<BulkItemResult>> {
        self.record(Call::BulkWrite {
            index: index.to_string(),
            documents: ops.len(),
            refresh,
        });
        let mut state = self.state.lock();
        let batch = state.bulk_batches_seen;
        state.bulk_batches_seen += 1;
        if state.failing_batches.contains(&batch) {
            return Err(EngineError::Transport("connection reset by peer".to_string()));
        }

        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            if op.document.get("malformed").and_then(Value::as_bool) == Some(true) {
                items.push(BulkItemResult::failed(
                    op.id.clone(),
                    400,
                    ItemError {
                        error_type: "mapper_parsing_exception".to_string(),
                        reason: "failed to parse field [due_date]".to_string(),
                    },
                ));
                continue;
            }

            let id = op.id.clone().unwrap_or_else(|| {
                state.next_auto_id += 1;
                format!("auto-{}", state.next_auto_id)
            });
            state
                .indices
                .entry(index.to_string())
                .or_default()
                .documents
                .insert(id.clone(), op.document.clone());
            items.push(BulkItemResult::ok(Some(id)));
        }
        Ok(items)
    }

    async fn reindex(&self, source: &str, dest: &str) -> EngineResult<ReindexResponse> {
        self.record(Call::Reindex {
            source: source.to_string(),
            dest: dest.to_string(),
        });
        // a real reindex takes a while; let concurrent callers interleave
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        injected(&state, FailPoint::Reindex)?;
        let documents = state
            .indices
            .get(source)
            .map(|idx| idx.documents.clone())
            .ok_or_else(|| missing(source))?;

        let failures = state.reindex_failures.clone();
        let copied = (documents.len() as u64).saturating_sub(failures.len() as u64);
        if let Some(target) = state.indices.get_mut(dest) {
            target.documents.extend(documents);
        } else {
            return Err(missing(dest));
        }

        Ok(ReindexResponse {
            took: 12,
            total: copied + failures.len() as u64,
            created: copied,
            updated: 0,
            failures,
        })
    }

    async fn query(&self, index: &str, body: &Value, timeout: Duration) -> EngineResult<QueryResponse> {
        self.record(Call::Query {
            index: index.to_string(),
            body: body.clone(),
            timeout,
        });
        let behavior = self.state.lock().query.clone();
        match behavior {
            QueryBehavior::Hits { hits, total } => Ok(QueryResponse {
                total: total.unwrap_or(hits.len() as u64),
                hits,
                took: 3,
                timed_out: false,
                aggregations: None,
            }),
            QueryBehavior::EngineTimedOut => Ok(QueryResponse {
                hits: Vec::new(),
                total: 0,
                took: 200,
                timed_out: true,
                aggregations: None,
            }),
            QueryBehavior::Api { status, error_type } => {
                Err(api_error(status, &error_type, "engine rejected the request"))
            }
            QueryBehavior::Transport => Err(EngineError::Transport("connection refused".to_string())),
            QueryBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::Timeout(timeout))
            }
        }
    }
}

/// A hit with the given id and score
pub fn hit(id: &str, score: Option<f64>) -> EngineHit {
    let mut source = Map::new();
    source.insert("id".to_string(), json!(id));
    source.insert("title".to_string(), json!(format!("Task {}", id)));
    EngineHit {
        index: "tasks_v1".to_string(),
        id: id.to_string(),
        score,
        source,
        highlight: None,
    }
}

/// A task document
pub fn task(n: usize) -> Value {
    json!({
        "id": format!("task-{}", n),
        "title": format!("Task number {}", n),
        "status": if n % 2 == 0 { "open" } else { "done" },
    })
}

/// Breaker that trips quickly, for tests
pub fn test_breaker() -> Arc<CircuitBreaker> {
    let config = CircuitBreakerConfig::builder()
        .error_threshold_percentage(50.0)
        .volume_threshold(4)
        .rolling_window(Duration::from_secs(10))
        .rolling_buckets(10)
        .cooldown(Duration::from_secs(30))
        .half_open_max_requests(1)
        .build()
        .unwrap();
    Arc::new(CircuitBreaker::new("test-search", config))
}

/// Orchestrator over a fake engine with fast health polling
pub fn orchestrator(engine: Arc<FakeEngine>) -> SearchOrchestrator {
    orchestrator_with_breaker(engine, test_breaker())
}

pub fn orchestrator_with_breaker(
    engine: Arc<FakeEngine>,
    breaker: Arc<CircuitBreaker>,
) -> SearchOrchestrator {
    let mut settings = SearchSettings::default();
    settings.index.health_poll_interval_ms = 10;
    settings.index.health_wait_timeout_ms = 1_000;
    SearchOrchestrator::new(engine, breaker, settings)
}
