//! Prometheus metrics for the search layer.
//!
//! Metrics are created once at first use and must be registered with a
//! [`Registry`] via [`init_metrics`] to be exported.

use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "taskhub_search";

/// Container for all search-layer metrics
pub struct SearchMetrics {
    /// Current breaker state (0=closed, 1=open, 2=half-open)
    pub breaker_state: GaugeVec,

    /// Calls offered to a breaker, labelled `allowed` or `rejected`
    pub breaker_calls: CounterVec,

    /// Breaker-admitted calls by outcome (`success` / `failure`)
    pub breaker_outcomes: CounterVec,

    /// Breaker state transitions
    pub breaker_transitions: CounterVec,

    /// Query latency as measured by the caller
    pub query_duration: HistogramVec,

    /// Queries by outcome (`success`, `validation`, `client_shape`, `service`, `breaker_open`)
    pub queries: CounterVec,

    /// Bulk-ingested documents by result (`indexed` / `failed`)
    pub bulk_documents: CounterVec,

    /// Index lifecycle operations by operation and result
    pub lifecycle_operations: CounterVec,
}

impl SearchMetrics {
    fn new() -> Self {
        Self {
            breaker_state: GaugeVec::new(
                Opts::new("circuit_breaker_state", "Current state of circuit breakers")
                    .namespace(NAMESPACE),
                &["name"],
            )
            .expect("valid circuit_breaker_state metric"),

            breaker_calls: CounterVec::new(
                Opts::new(
                    "circuit_breaker_calls_total",
                    "Calls offered to circuit breakers by admission decision",
                )
                .namespace(NAMESPACE),
                &["name", "admission"],
            )
            .expect("valid circuit_breaker_calls_total metric"),

            breaker_outcomes: CounterVec::new(
                Opts::new(
                    "circuit_breaker_outcomes_total",
                    "Outcomes of calls admitted by circuit breakers",
                )
                .namespace(NAMESPACE),
                &["name", "outcome"],
            )
            .expect("valid circuit_breaker_outcomes_total metric"),

            breaker_transitions: CounterVec::new(
                Opts::new(
                    "circuit_breaker_state_transitions_total",
                    "Circuit breaker state transitions",
                )
                .namespace(NAMESPACE),
                &["name", "from_state", "to_state"],
            )
            .expect("valid circuit_breaker_state_transitions_total metric"),

            query_duration: HistogramVec::new(
                HistogramOpts::new("query_duration_seconds", "Wall-clock search latency")
                    .namespace(NAMESPACE)
                    .buckets(vec![
                        0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
                    ]),
                &["index"],
            )
            .expect("valid query_duration_seconds metric"),

            queries: CounterVec::new(
                Opts::new("queries_total", "Search queries by outcome").namespace(NAMESPACE),
                &["index", "outcome"],
            )
            .expect("valid queries_total metric"),

            bulk_documents: CounterVec::new(
                Opts::new("bulk_documents_total", "Bulk-ingested documents by result")
                    .namespace(NAMESPACE),
                &["index", "result"],
            )
            .expect("valid bulk_documents_total metric"),

            lifecycle_operations: CounterVec::new(
                Opts::new(
                    "index_lifecycle_operations_total",
                    "Index lifecycle operations by result",
                )
                .namespace(NAMESPACE),
                &["operation", "result"],
            )
            .expect("valid index_lifecycle_operations_total metric"),
        }
    }

    /// Record the result of one lifecycle operation
    pub fn lifecycle(&self, operation: &str, ok: bool) {
        self.lifecycle_operations
            .with_label_values(&[operation, if ok { "ok" } else { "error" }])
            .inc();
    }
}

lazy_static! {
    /// Global search metrics instance
    pub static ref METRICS: SearchMetrics = SearchMetrics::new();
}

/// Register all search-layer metrics with a Prometheus registry
pub fn init_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(METRICS.breaker_state.clone()))?;
    registry.register(Box::new(METRICS.breaker_calls.clone()))?;
    registry.register(Box::new(METRICS.breaker_outcomes.clone()))?;
    registry.register(Box::new(METRICS.breaker_transitions.clone()))?;
    registry.register(Box::new(METRICS.query_duration.clone()))?;
    registry.register(Box::new(METRICS.queries.clone()))?;
    registry.register(Box::new(METRICS.bulk_documents.clone()))?;
    registry.register(Box::new(METRICS.lifecycle_operations.clone()))?;

    tracing::info!("Search metrics initialized");
    Ok(())
}
