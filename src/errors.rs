use http::StatusCode;
use thiserror::Error;

/// Fatal, run-aborting failures. Any of these surfaces before a single
/// query is issued; no output document is produced.
#[derive(Debug, Error)]
pub enum TracerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid {what}: {value:?}")]
    InvalidFormat { what: &'static str, value: String },

    #[error("start of interval must be before end")]
    InvalidRange,
}

/// Helper for mapping any unknown startup error into a configuration error
pub fn config_error<E: ToString>(err: E) -> TracerError {
    TracerError::Configuration(err.to_string())
}

/// Per-query failures from the search backend. Caught at the query
/// boundary and recorded inline in that query's result; sibling queries
/// and sections keep running.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Graylog API error {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Body(String),
}

impl BackendError {
    /// The modern search endpoint signals "not deployed" with a plain 404.
    /// Only that status selects the legacy fallback; every other failure
    /// fails the query.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}
