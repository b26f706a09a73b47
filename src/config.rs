use std::collections::HashSet;
use std::env;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use validator::Validate;

use crate::errors::{config_error, TracerError};

/// Rows requested per page from either search surface.
pub const PAGE_SIZE: usize = 500;

/// Timeout applied to each page fetch; the overall wall-clock limit is
/// the calling harness's concern.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Value of the `X-Requested-By` header Graylog records for auditing.
pub const REQUESTED_BY: &str = "issue-tracer";

/// Fields requested from the search API unless the caller asks for the
/// backend's native full field set with `--no-fields`.
pub const DEFAULT_FIELDS: &[&str] = &[
    "timestamp",
    "message",
    "source",
    "level",
    "type",
    "data_url_host",
    "url_host",
    "data_message_exception",
    "response_status",
    "host",
    "gl2_source_input",
    "gl2_source_node",
];

/// Fixed enumeration of query groups. Iteration order in output is
/// always [`SectionKey::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKey {
    #[serde(rename = "backend_mobapi")]
    BackendMobapi,
    #[serde(rename = "frontend_nextjs")]
    FrontendNextjs,
    #[serde(rename = "frontend_nextjs_pods")]
    FrontendNextjsPods,
}

impl SectionKey {
    pub const ALL: [SectionKey; 3] = [
        SectionKey::BackendMobapi,
        SectionKey::FrontendNextjs,
        SectionKey::FrontendNextjsPods,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::BackendMobapi => "backend_mobapi",
            SectionKey::FrontendNextjs => "frontend_nextjs",
            SectionKey::FrontendNextjsPods => "frontend_nextjs_pods",
        }
    }

    pub fn queries_env_var(self) -> &'static str {
        match self {
            SectionKey::BackendMobapi => "GRAYLOG_QUERIES_BACKEND_MOBAPI",
            SectionKey::FrontendNextjs => "GRAYLOG_QUERIES_FRONTEND_NEXTJS",
            SectionKey::FrontendNextjsPods => "GRAYLOG_QUERIES_FRONTEND_NEXTJS_PODS",
        }
    }

    /// Only the pods section is eligible for time-bucket aggregation.
    pub fn is_aggregated(self) -> bool {
        matches!(self, SectionKey::FrontendNextjsPods)
    }
}

/// Backend address and credentials, validated once at startup.
#[derive(Debug, Clone, Validate)]
pub struct SearchConfig {
    #[validate(length(min = 1))]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Default interval bounds from the environment. Times fall back to the
/// whole-day bounds when unset; dates are required unless the caller
/// overrides the interval on the command line.
#[derive(Debug, Clone, Default)]
pub struct IntervalEnv {
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
}

#[derive(Debug, Clone)]
pub struct TracerConfig {
    pub search: SearchConfig,
    /// Section -> ordered query list, in [`SectionKey::ALL`] order.
    pub sections: Vec<(SectionKey, Vec<String>)>,
    /// Allow-list of field names copied into canonical messages.
    pub output_fields: HashSet<String>,
    /// Lowercased suppression keywords; empty means no filtering.
    pub filter_keywords: Vec<String>,
    /// Bucket width in seconds for the pods section; 0 disables aggregation.
    pub pods_bucket_seconds: i64,
    pub default_interval: IntervalEnv,
}

/// Read and validate the whole configuration surface. Every malformed
/// value here is fatal; nothing is deferred to per-query handling.
pub fn load_config() -> Result<TracerConfig, TracerError> {
    let search = SearchConfig {
        base_url: env_or_default("GRAYLOG_DOMAIN")
            .trim_end_matches('/')
            .to_string(),
        username: env_or_default("GRAYLOG_USERNAME"),
        password: env_or_default("GRAYLOG_PASSWORD"),
    };
    search.validate().map_err(|_| {
        TracerError::Configuration(
            "set GRAYLOG_DOMAIN, GRAYLOG_USERNAME, GRAYLOG_PASSWORD in .env".into(),
        )
    })?;

    let mut sections = Vec::with_capacity(SectionKey::ALL.len());
    for key in SectionKey::ALL {
        let var = key.queries_env_var();
        let raw = env::var(var).unwrap_or_else(|_| "[]".into());
        let queries = parse_string_array(&raw, var)?;
        debug!(section = key.as_str(), count = queries.len(), "loaded section queries");
        sections.push((key, queries));
    }

    let output_fields_raw = env::var("GRAYLOG_OUTPUT_FIELDS").unwrap_or_else(|_| "[]".into());
    let output_fields = parse_string_array(&output_fields_raw, "GRAYLOG_OUTPUT_FIELDS")?
        .into_iter()
        .collect();

    let keywords_raw = env::var("GRAYLOG_FILTER_KEYWORDS").unwrap_or_else(|_| "[]".into());
    let filter_keywords = parse_string_array(&keywords_raw, "GRAYLOG_FILTER_KEYWORDS")?
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let frame_raw = env_or_default("GRAYLOG_QUERIES_FRONTEND_NEXTJS_PODS_TIME_FRAME");
    let pods_bucket_seconds = parse_time_frame_seconds(&frame_raw)?;

    let default_interval = IntervalEnv {
        start_date: env_or_default("START_DATE").trim().to_string(),
        start_time: nonempty_or(env_or_default("START_TIME"), "00:00"),
        end_date: env_or_default("END_DATE").trim().to_string(),
        end_time: nonempty_or(env_or_default("END_TIME"), "23:59"),
    };

    Ok(TracerConfig {
        search,
        sections,
        output_fields,
        filter_keywords,
        pods_bucket_seconds,
        default_interval,
    })
}

fn env_or_default(var: &str) -> String {
    env::var(var).unwrap_or_default()
}

fn nonempty_or(value: String, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// JSON-array-shaped environment values must parse exactly into a list
/// of strings.
fn parse_string_array(raw: &str, var: &str) -> Result<Vec<String>, TracerError> {
    serde_json::from_str(raw)
        .map_err(|e| config_error(format!("{var} must be a JSON array of strings: {e}")))
}

/// Bucket width like `4s`, `1m`, `2h`, or bare seconds. Empty input
/// disables aggregation.
fn parse_time_frame_seconds(raw: &str) -> Result<i64, TracerError> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return Ok(0);
    }
    let (number, multiplier) = match s.strip_suffix(['s', 'm', 'h']) {
        Some(prefix) => {
            let unit = s.as_bytes()[s.len() - 1];
            let multiplier = match unit {
                b's' => 1,
                b'm' => 60,
                _ => 3600,
            };
            (prefix.trim().to_string(), multiplier)
        }
        None => (s.clone(), 1),
    };
    if number.is_empty() {
        return Ok(0);
    }
    let value: i64 = number.parse().map_err(|_| TracerError::InvalidFormat {
        what: "time frame",
        value: raw.to_string(),
    })?;
    Ok(value * multiplier)
}
