use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Absolute time range in the modern search request body.
#[derive(Debug, Clone, Serialize)]
pub struct AbsoluteTimeRange {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub from: String,
    pub to: String,
}

impl AbsoluteTimeRange {
    pub fn new(from: String, to: String) -> Self {
        Self {
            kind: "absolute",
            from,
            to,
        }
    }
}

/// Request body for the modern search surface.
#[derive(Debug, Serialize)]
pub struct ScriptingSearchRequest<'a> {
    pub query: &'a str,
    pub timerange: AbsoluteTimeRange,
    pub from: usize,
    pub size: usize,
    pub sort: &'a str,
    pub sort_order: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'a [String]>,
}

/// One page of the modern search surface: a shared schema plus
/// positional value rows.
#[derive(Debug, Deserialize)]
pub struct ScriptingSearchResponse {
    #[serde(default)]
    pub schema: Vec<SchemaColumn>,
    #[serde(default)]
    pub datarows: Vec<Vec<Value>>,
}

/// Column descriptor. Some backend builds name the key `field`, others
/// `name`.
#[derive(Debug, Deserialize)]
pub struct SchemaColumn {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SchemaColumn {
    pub fn label(&self) -> String {
        self.field
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

/// One page of the legacy search surface: per-message field
/// dictionaries instead of a shared schema.
#[derive(Debug, Deserialize)]
pub struct LegacySearchResponse {
    #[serde(default)]
    pub messages: Vec<LegacyMessageEnvelope>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyMessageEnvelope {
    #[serde(default)]
    pub message: Value,
}

impl LegacyMessageEnvelope {
    /// The field dictionary, whether nested under `fields` or inlined
    /// on the message object itself.
    pub fn field_map(&self) -> Option<&Map<String, Value>> {
        let obj = self.message.as_object()?;
        match obj.get("fields").and_then(Value::as_object) {
            Some(nested) => Some(nested),
            None => Some(obj),
        }
    }
}

/// Accumulated result of one query: the captured schema and every row
/// across all pages, positionally aligned.
#[derive(Debug, Default, PartialEq)]
pub struct SchemaRows {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}
