use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::interval::service::IntervalMetadata;

pub const TIMESTAMP_KEY: &str = "timestamp";
pub const SECTION_KEY: &str = "_section";
pub const QUERY_KEY: &str = "_query";
pub const MESSAGE_FIELD: &str = "message";

/// The normalized record emitted for every matched log entry.
///
/// Key order is a contract for consumers doing positional display:
/// `timestamp` (when parseable), `_section`, `_query`, then the
/// requested fields in schema order. Backed by an insertion-ordered map
/// (`serde_json` with `preserve_order`), so serialization preserves
/// exactly the order keys were inserted in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalMessage(Map<String, Value>);

impl CanonicalMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.get(TIMESTAMP_KEY).and_then(Value::as_str)
    }
}

/// Stringify a field value the way the display and filter layers see
/// it: strings verbatim, everything else in JSON notation.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Outcome of one query: either an error string or the normalized
/// messages plus their count. The complete shape (index and query text)
/// is always present, even under failure.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query_index: usize,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    pub messages: Vec<CanonicalMessage>,
}

impl QueryResult {
    pub fn success(query_index: usize, query: &str, messages: Vec<CanonicalMessage>) -> Self {
        Self {
            query_index,
            query: query.to_string(),
            error: None,
            message_count: Some(messages.len()),
            messages,
        }
    }

    pub fn failure(query_index: usize, query: &str, error: String) -> Self {
        Self {
            query_index,
            query: query.to_string(),
            error: Some(error),
            message_count: None,
            messages: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.message_count.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionSummary {
    pub total_messages: usize,
    pub per_query: Vec<usize>,
}

/// One section's complete breakdown: its configured queries, per-query
/// results, and the concatenation of all non-error messages.
#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub queries: Vec<String>,
    pub results: Vec<QueryResult>,
    pub messages: Vec<CanonicalMessage>,
    pub summary: SectionSummary,
}

impl SectionResult {
    pub fn empty() -> Self {
        Self {
            queries: Vec::new(),
            results: Vec::new(),
            messages: Vec::new(),
            summary: SectionSummary {
                total_messages: 0,
                per_query: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_messages: usize,
    /// Section key -> `SectionSummary`, in section iteration order.
    pub by_section: Map<String, Value>,
}

/// The complete output document for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub interval: IntervalMetadata,
    /// Section key -> `SectionResult`, in section iteration order.
    pub sections: Map<String, Value>,
    pub summary: RunSummary,
}
