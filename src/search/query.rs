//! Search query model and engine query building

use crate::search::config::QuerySettings;
use crate::search::error::SearchError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Characters that switch a query to query-string syntax (phrase, fuzzy, boost)
const RESERVED_SYNTAX: &[char] = &['"', '~', '^'];

static TIME_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)(nanos|micros|ms|s|m|h|d)$").expect("time value pattern is valid")
});

/// Sort direction for the secondary sort field
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Page selection and secondary ordering
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Pagination {
    /// 1-based page number
    #[validate(range(min = 1))]
    pub page: u64,

    /// Page size
    #[validate(range(min = 1, max = 10_000))]
    pub limit: u64,

    /// Secondary sort field, applied after relevance
    #[serde(default)]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            sort_by: None,
            sort_order: SortOrder::default(),
        }
    }

    /// Offset of the first hit on this page
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Search request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SearchQuery {
    /// Free-text query
    pub query: String,

    /// Exact-match filters; a value may be a scalar or an array of scalars
    #[serde(default)]
    pub filters: Option<BTreeMap<String, Value>>,

    #[serde(default)]
    #[validate(nested)]
    pub pagination: Pagination,

    /// Analyzer override for the full-text clause
    #[serde(default)]
    pub analyzer: Option<String>,

    /// Timeout override in engine time units (`750ms`, `2s`)
    #[serde(default)]
    pub timeout: Option<String>,

    /// Aggregation definitions passed to the engine as-is
    #[serde(default)]
    pub aggregations: Option<Map<String, Value>>,

    /// Caller correlation ID, echoed in the response
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: None,
            pagination: Pagination::default(),
            analyzer: None,
            timeout: None,
            aggregations: None,
            correlation_id: None,
        }
    }

    /// Add an exact-match filter
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), value.into());
        self
    }

    /// Select a page
    pub fn with_page(mut self, page: u64, limit: u64) -> Self {
        self.pagination.page = page;
        self.pagination.limit = limit;
        self
    }

    /// Sort by a field after relevance
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.pagination.sort_by = Some(field.into());
        self.pagination.sort_order = order;
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn with_aggregations(mut self, aggregations: Map<String, Value>) -> Self {
        self.aggregations = Some(aggregations);
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Whether the text uses reserved query syntax
    pub fn uses_query_syntax(&self) -> bool {
        self.query.contains(RESERVED_SYNTAX)
    }

    /// Classify the query for timeout budgeting
    pub fn complexity(&self, settings: &QuerySettings) -> QueryComplexity {
        QueryComplexity::classify(&self.query, settings.complex_length)
    }

    /// Engine-side timeout budget: explicit override, else by complexity
    pub fn resolve_timeout(&self, settings: &QuerySettings) -> Result<Duration, SearchError> {
        match &self.timeout {
            Some(raw) => parse_time_value(raw).ok_or_else(|| {
                SearchError::Validation(format!("invalid timeout '{}', expected e.g. 500ms or 2s", raw))
            }),
            None => Ok(match self.complexity(settings) {
                QueryComplexity::Simple => settings.simple_timeout(),
                QueryComplexity::Complex => settings.complex_timeout(),
            }),
        }
    }

    /// Check everything that can be checked without the engine
    pub fn check(&self, settings: &QuerySettings) -> Result<(), SearchError> {
        self.validate()?;

        let window = self.pagination.offset().saturating_add(self.pagination.limit);
        if window > settings.max_result_window {
            return Err(SearchError::Validation(format!(
                "page {} of size {} reaches past the result window of {}",
                self.pagination.page, self.pagination.limit, settings.max_result_window
            )));
        }

        if let Some(field) = &self.pagination.sort_by {
            if field.trim().is_empty() {
                return Err(SearchError::Validation("sort field must not be empty".to_string()));
            }
        }

        for (field, value) in self.filters.iter().flatten() {
            if field.trim().is_empty() {
                return Err(SearchError::Validation("filter field must not be empty".to_string()));
            }
            let valid = match value {
                Value::Array(items) => !items.is_empty() && items.iter().all(is_scalar),
                other => is_scalar(other),
            };
            if !valid {
                return Err(SearchError::Validation(format!(
                    "filter '{}' must be a scalar or a non-empty array of scalars",
                    field
                )));
            }
        }

        self.resolve_timeout(settings)?;
        Ok(())
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Timeout class of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryComplexity {
    Simple,
    Complex,
}

impl QueryComplexity {
    /// Complex when longer than `max_simple_len` characters or using reserved syntax
    pub fn classify(text: &str, max_simple_len: usize) -> Self {
        if text.chars().count() > max_simple_len || text.contains(RESERVED_SYNTAX) {
            QueryComplexity::Complex
        } else {
            QueryComplexity::Simple
        }
    }
}

/// Parse an engine time value such as `500ms`, `2s` or `1m`
pub fn parse_time_value(raw: &str) -> Option<Duration> {
    let caps = TIME_VALUE.captures(raw.trim())?;
    let amount: u64 = caps[1].parse().ok()?;
    let duration = match &caps[2] {
        "nanos" => Duration::from_nanos(amount),
        "micros" => Duration::from_micros(amount),
        "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.checked_mul(60)?),
        "h" => Duration::from_secs(amount.checked_mul(3_600)?),
        "d" => Duration::from_secs(amount.checked_mul(86_400)?),
        _ => return None,
    };
    (!duration.is_zero()).then_some(duration)
}

/// Format a duration as an engine time value in milliseconds
pub fn format_time_value(duration: Duration) -> String {
    format!("{}ms", duration.as_millis().max(1))
}

/// Builds engine query bodies from `SearchQuery` values
pub struct QueryBuilder<'a> {
    settings: &'a QuerySettings,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(settings: &'a QuerySettings) -> Self {
        Self { settings }
    }

    /// Build the full search body
    pub fn build(&self, query: &SearchQuery, timeout: Duration) -> Value {
        let mut bool_query = Map::new();
        bool_query.insert("must".to_string(), json!([self.text_clause(query)]));

        let filters = self.filter_clauses(query);
        if !filters.is_empty() {
            bool_query.insert("filter".to_string(), Value::Array(filters));
        }

        let mut body = json!({
            "query": { "bool": bool_query },
            "from": query.pagination.offset(),
            "size": query.pagination.limit,
            "track_total_hits": true,
            "sort": self.sort_clauses(query),
            "highlight": self.highlight_clause(),
            "timeout": format_time_value(timeout),
        });

        if let Some(aggs) = &query.aggregations {
            body["aggs"] = Value::Object(aggs.clone());
        }

        body
    }

    /// Full-text clause over the weighted field set
    pub fn text_clause(&self, query: &SearchQuery) -> Value {
        let text = query.query.trim();
        if text.is_empty() {
            return json!({ "match_all": {} });
        }

        let fields: Vec<String> = self
            .settings
            .text_fields
            .iter()
            .map(|f| f.to_query_field())
            .collect();

        let (kind, operator_key) = if query.uses_query_syntax() {
            ("query_string", "default_operator")
        } else {
            ("multi_match", "operator")
        };

        let mut clause = json!({ "query": text, "fields": fields, operator_key: "and" });
        if let Some(analyzer) = &query.analyzer {
            clause["analyzer"] = json!(analyzer);
        }

        json!({ kind: clause })
    }

    /// One term (or terms) clause per filter entry
    pub fn filter_clauses(&self, query: &SearchQuery) -> Vec<Value> {
        query
            .filters
            .iter()
            .flatten()
            .map(|(field, value)| match value {
                Value::Array(values) => json!({ "terms": { field: values } }),
                scalar => json!({ "term": { field: scalar } }),
            })
            .collect()
    }

    /// Relevance first, then the caller's field
    pub fn sort_clauses(&self, query: &SearchQuery) -> Vec<Value> {
        let mut sort = vec![json!({ "_score": { "order": "desc" } })];
        if let Some(field) = &query.pagination.sort_by {
            if field != "_score" {
                sort.push(json!({ field: { "order": query.pagination.sort_order.as_str() } }));
            }
        }
        sort
    }

    fn highlight_clause(&self) -> Value {
        let fields: Map<String, Value> = self
            .settings
            .text_fields
            .iter()
            .map(|f| (f.name.clone(), json!({})))
            .collect();
        json!({ "fields": fields })
    }
}
