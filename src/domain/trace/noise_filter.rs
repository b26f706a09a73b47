use crate::domain::trace::message::{display_string, CanonicalMessage};

/// True when any non-underscore field value contains one of the
/// configured keywords (case-insensitive substring match).
pub fn contains_filter_keyword(msg: &CanonicalMessage, keywords_lower: &[String]) -> bool {
    if keywords_lower.is_empty() {
        return false;
    }
    for (key, value) in msg.iter() {
        if key.starts_with('_') || value.is_null() {
            continue;
        }
        let haystack = display_string(value).to_lowercase();
        if keywords_lower.iter().any(|kw| haystack.contains(kw.as_str())) {
            return true;
        }
    }
    false
}

/// Drop messages matching any suppression keyword. An empty keyword
/// list passes the batch through untouched.
pub fn apply(messages: Vec<CanonicalMessage>, keywords_lower: &[String]) -> Vec<CanonicalMessage> {
    if keywords_lower.is_empty() {
        return messages;
    }
    messages
        .into_iter()
        .filter(|m| !contains_filter_keyword(m, keywords_lower))
        .collect()
}
