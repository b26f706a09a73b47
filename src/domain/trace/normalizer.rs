use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::SectionKey;
use crate::domain::interval::service::format_timestamp_tehran;
use crate::domain::trace::message::{CanonicalMessage, QUERY_KEY, SECTION_KEY, TIMESTAMP_KEY};

/// Map one positional row onto the canonical record shape.
///
/// Only fields in the requested output set are copied; the timestamp
/// field is converted to the Tehran display form. An unparseable or
/// absent timestamp omits the `timestamp` key rather than failing the
/// record.
pub fn row_to_message(
    schema_fields: &[String],
    row: &[Value],
    query: &str,
    section: SectionKey,
    output_fields: &HashSet<String>,
) -> CanonicalMessage {
    let mut timestamp_tehran = None;
    let mut rest: Vec<(&String, &Value)> = Vec::new();

    for (i, field) in schema_fields.iter().enumerate() {
        let Some(value) = row.get(i) else { continue };
        if !output_fields.contains(field) {
            continue;
        }
        if field == TIMESTAMP_KEY {
            if let Some(dt) = parse_timestamp_to_utc(value) {
                timestamp_tehran = Some(format_timestamp_tehran(dt));
            }
        } else {
            rest.push((field, value));
        }
    }

    let mut msg = CanonicalMessage::new();
    if let Some(ts) = timestamp_tehran {
        msg.insert(TIMESTAMP_KEY, Value::String(ts));
    }
    msg.insert(SECTION_KEY, Value::String(section.as_str().to_string()));
    msg.insert(QUERY_KEY, Value::String(query.to_string()));
    for (field, value) in rest {
        msg.insert(field.clone(), value.clone());
    }
    msg
}

/// Convert a raw timestamp value to UTC. Accepts ISO-8601 strings and
/// Unix epochs in seconds or milliseconds (numeric values above 1e12
/// are treated as milliseconds).
pub fn parse_timestamp_to_utc(value: &Value) -> Option<DateTime<Utc>> {
    if value.is_null() {
        return None;
    }
    if let Some(s) = value.as_str() {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    let epoch = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    epoch_to_utc(epoch)
}

fn epoch_to_utc(ts: f64) -> Option<DateTime<Utc>> {
    let seconds = if ts > 1e12 { ts / 1000.0 } else { ts };
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
