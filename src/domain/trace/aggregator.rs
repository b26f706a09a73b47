use std::collections::BTreeMap;

use chrono::DateTime;
use serde_json::Value;
use tracing::debug;

use crate::config::SectionKey;
use crate::domain::interval::service::{format_timestamp_tehran, parse_display_timestamp};
use crate::domain::trace::message::{
    display_string, CanonicalMessage, MESSAGE_FIELD, QUERY_KEY, SECTION_KEY, TIMESTAMP_KEY,
};

/// Collapse messages into fixed-width time windows, one synthetic
/// record per non-empty bucket.
///
/// Bucket index is `floor(unix_seconds / width) * width` of each
/// message's rendered timestamp; records whose timestamp cannot be
/// parsed back are dropped from aggregation. Within a bucket, messages
/// are ordered by rendered timestamp (lexicographic equals
/// chronological for the fixed format) and their `message` values are
/// trimmed and joined with newlines. A non-positive width is a no-op.
pub fn aggregate_by_time_frame(
    messages: Vec<CanonicalMessage>,
    frame_seconds: i64,
    section: SectionKey,
    query: &str,
) -> Vec<CanonicalMessage> {
    if frame_seconds <= 0 || messages.is_empty() {
        return messages;
    }

    let input_count = messages.len();
    let mut buckets: BTreeMap<i64, Vec<CanonicalMessage>> = BTreeMap::new();
    for msg in messages {
        let Some(instant) = msg.timestamp().and_then(parse_display_timestamp) else {
            continue;
        };
        let bucket_id = instant.timestamp().div_euclid(frame_seconds) * frame_seconds;
        buckets.entry(bucket_id).or_default().push(msg);
    }
    debug!(
        section = section.as_str(),
        input = input_count,
        buckets = buckets.len(),
        width = frame_seconds,
        "aggregated messages into time buckets"
    );

    let mut aggregated = Vec::with_capacity(buckets.len());
    for (bucket_id, mut bucket) in buckets {
        bucket.sort_by(|a, b| a.timestamp().unwrap_or("").cmp(b.timestamp().unwrap_or("")));

        let lines: Vec<String> = bucket
            .iter()
            .filter_map(|m| m.get(MESSAGE_FIELD))
            .filter(|v| !v.is_null())
            .map(|v| display_string(v).trim().to_string())
            .collect();

        let Some(bucket_start) = DateTime::from_timestamp(bucket_id, 0) else {
            continue;
        };
        let mut out = CanonicalMessage::new();
        out.insert(
            TIMESTAMP_KEY,
            Value::String(format_timestamp_tehran(bucket_start)),
        );
        out.insert(SECTION_KEY, Value::String(section.as_str().to_string()));
        out.insert(QUERY_KEY, Value::String(query.to_string()));
        out.insert(MESSAGE_FIELD, Value::String(lines.join("\n")));
        aggregated.push(out);
    }
    aggregated
}
