use chrono::{DateTime, Utc};
use http::StatusCode;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{SearchConfig, PAGE_SIZE, REQUESTED_BY, REQUEST_TIMEOUT};
use crate::core::client::search_dto::{
    AbsoluteTimeRange, LegacySearchResponse, SchemaColumn, SchemaRows, ScriptingSearchRequest,
    ScriptingSearchResponse,
};
use crate::errors::BackendError;

const SEARCH_MESSAGES_PATH: &str = "/api/search/messages";
const SEARCH_UNIVERSAL_ABSOLUTE_PATH: &str = "/api/search/universal/absolute";

/// Error bodies are truncated to this many characters before they are
/// recorded in a query result.
const ERROR_BODY_LIMIT: usize = 500;

/// Schema-aware search client. Tries the modern scripting surface
/// first and falls back to the legacy universal/absolute surface when
/// the modern endpoint is missing (HTTP 404); both are normalized into
/// the same (schema fields, rows) shape.
pub struct GraylogClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl GraylogClient {
    pub fn new(cfg: &SearchConfig) -> Result<Self, BackendError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_http_client(cfg, http))
    }

    /// Build around a caller-supplied HTTP client.
    pub fn with_http_client(cfg: &SearchConfig, http: Client) -> Self {
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        }
    }

    /// Run one query over the full time window, paging until a short
    /// page. Only a 404 from the modern endpoint selects the legacy
    /// retry; any other failure belongs to the caller.
    pub async fn search(
        &self,
        query: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
        fields: Option<&[String]>,
    ) -> Result<SchemaRows, BackendError> {
        match self.search_scripting(query, from_utc, to_utc, fields).await {
            Err(e) if e.is_not_found() => {
                warn!(query, "modern search endpoint not found, retrying via legacy surface");
                self.search_legacy(query, from_utc, to_utc).await
            }
            other => other,
        }
    }

    /// POST /api/search/messages: shared schema plus positional rows.
    async fn search_scripting(
        &self,
        query: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
        fields: Option<&[String]>,
    ) -> Result<SchemaRows, BackendError> {
        let url = format!("{}{}", self.base_url, SEARCH_MESSAGES_PATH);
        let mut out = SchemaRows::default();
        let mut offset = 0usize;

        loop {
            let payload = ScriptingSearchRequest {
                query,
                timerange: AbsoluteTimeRange::new(api_bound(from_utc), api_bound(to_utc)),
                from: offset,
                size: PAGE_SIZE,
                sort: "timestamp",
                sort_order: "desc",
                fields,
            };
            let resp = self
                .http
                .post(&url)
                .basic_auth(&self.username, Some(&self.password))
                .header("Accept", "application/json")
                .header("X-Requested-By", REQUESTED_BY)
                .json(&payload)
                .send()
                .await?;

            let status = resp.status();
            if status != StatusCode::OK {
                let body = resp.text().await.unwrap_or_default();
                return Err(BackendError::Status {
                    status,
                    body: truncate_body(&body),
                });
            }
            let page: ScriptingSearchResponse = resp
                .json()
                .await
                .map_err(|e| BackendError::Body(e.to_string()))?;

            // Schema is captured once, from the first page that carries one.
            if out.fields.is_empty() && !page.schema.is_empty() {
                out.fields = page.schema.iter().map(SchemaColumn::label).collect();
            }

            let page_len = page.datarows.len();
            debug!(query, offset, rows = page_len, "fetched scripting search page");
            for row in page.datarows {
                if row.len() != out.fields.len() {
                    return Err(BackendError::Body(format!(
                        "row width {} disagrees with schema width {}",
                        row.len(),
                        out.fields.len()
                    )));
                }
                out.rows.push(row);
            }
            if page_len < PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        Ok(out)
    }

    /// GET /api/search/universal/absolute: per-message field
    /// dictionaries. The schema is derived from the first message and
    /// later messages are aligned to it, missing fields becoming null.
    async fn search_legacy(
        &self,
        query: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<SchemaRows, BackendError> {
        let url = format!("{}{}", self.base_url, SEARCH_UNIVERSAL_ABSOLUTE_PATH);
        let mut out = SchemaRows::default();
        let mut offset = 0usize;

        loop {
            let params: Vec<(&str, String)> = vec![
                ("query", query.to_string()),
                ("from", api_bound(from_utc)),
                ("to", api_bound(to_utc)),
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
                ("sort", "timestamp".to_string()),
                ("order", "desc".to_string()),
            ];
            let resp = self
                .http
                .get(&url)
                .basic_auth(&self.username, Some(&self.password))
                .header("Accept", "application/json")
                .header("X-Requested-By", REQUESTED_BY)
                .query(&params)
                .send()
                .await?;

            let status = resp.status();
            if status != StatusCode::OK {
                let body = resp.text().await.unwrap_or_default();
                return Err(BackendError::Status {
                    status,
                    body: truncate_body(&body),
                });
            }
            let page: LegacySearchResponse = resp
                .json()
                .await
                .map_err(|e| BackendError::Body(e.to_string()))?;

            let page_len = page.messages.len();
            debug!(query, offset, messages = page_len, "fetched legacy search page");
            for envelope in &page.messages {
                let Some(fields_map) = envelope.field_map() else {
                    continue;
                };
                if out.fields.is_empty() {
                    out.fields = fields_map.keys().cloned().collect();
                }
                let row = out
                    .fields
                    .iter()
                    .map(|f| fields_map.get(f).cloned().unwrap_or(Value::Null))
                    .collect();
                out.rows.push(row);
            }
            if page_len < PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        Ok(out)
    }
}

/// Render a window bound for either protocol surface.
fn api_bound(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn search_config(base_url: &str) -> SearchConfig {
        SearchConfig {
            base_url: base_url.to_string(),
            username: "reader".into(),
            password: "secret".into(),
        }
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            "2024-02-20T06:30:00Z".parse().unwrap(),
            "2024-02-20T14:30:00Z".parse().unwrap(),
        )
    }

    fn scripting_page(rows: &[Value]) -> String {
        json!({
            "schema": [{"field": "timestamp"}, {"field": "message"}],
            "datarows": rows,
        })
        .to_string()
    }

    #[tokio::test]
    async fn modern_surface_paginates_until_a_short_page() {
        let mut server = mockito::Server::new_async().await;

        let full_page: Vec<Value> = (0..PAGE_SIZE)
            .map(|i| json!([format!("2024-02-20T10:{:02}:{:02}.000Z", i / 60, i % 60), format!("m{i}")]))
            .collect();
        let first = server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .match_header("x-requested-by", REQUESTED_BY)
            .match_body(Matcher::PartialJson(json!({"from": 0, "size": PAGE_SIZE})))
            .with_status(200)
            .with_body(scripting_page(&full_page))
            .create_async()
            .await;
        let second = server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .match_body(Matcher::PartialJson(json!({"from": PAGE_SIZE})))
            .with_status(200)
            .with_body(scripting_page(&[json!(["2024-02-20T11:00:00.000Z", "last"])]))
            .create_async()
            .await;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap();
        let client = GraylogClient::with_http_client(&search_config(&server.url()), http);
        let (from, to) = window();
        let result = client.search("level:3", from, to, None).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(result.fields, vec!["timestamp", "message"]);
        assert_eq!(result.rows.len(), PAGE_SIZE + 1);
        assert_eq!(result.rows[PAGE_SIZE][1], json!("last"));
    }

    #[tokio::test]
    async fn requested_fields_are_forwarded_in_the_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .match_body(Matcher::PartialJson(json!({
                "fields": ["timestamp", "message"],
                "sort": "timestamp",
                "sort_order": "desc",
                "timerange": {
                    "type": "absolute",
                    "from": "2024-02-20T06:30:00.000Z",
                    "to": "2024-02-20T14:30:00.000Z",
                },
            })))
            .with_status(200)
            .with_body(scripting_page(&[]))
            .create_async()
            .await;

        let client = GraylogClient::new(&search_config(&server.url())).unwrap();
        let (from, to) = window();
        let fields = vec!["timestamp".to_string(), "message".to_string()];
        client
            .search("level:3", from, to, Some(&fields))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn a_404_falls_back_to_the_legacy_surface() {
        let mut server = mockito::Server::new_async().await;
        let modern = server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .with_status(404)
            .with_body("Not found")
            .create_async()
            .await;
        let legacy = server
            .mock("GET", SEARCH_UNIVERSAL_ABSOLUTE_PATH)
            .match_query(Matcher::UrlEncoded("query".into(), "level:3".into()))
            .with_status(200)
            .with_body(
                json!({
                    "messages": [
                        {"message": {"timestamp": "2024-02-20T10:00:00.000Z", "message": "first", "level": 3}},
                        {"message": {"timestamp": "2024-02-20T10:00:01.000Z", "level": 4}},
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GraylogClient::new(&search_config(&server.url())).unwrap();
        let (from, to) = window();
        let result = client.search("level:3", from, to, None).await.unwrap();

        modern.assert_async().await;
        legacy.assert_async().await;
        assert_eq!(result.fields, vec!["timestamp", "message", "level"]);
        // Second message is aligned to the first message's schema.
        assert_eq!(result.rows[1][1], Value::Null);
        assert_eq!(result.rows[1][2], json!(4));
    }

    #[tokio::test]
    async fn non_404_errors_do_not_fall_back() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;
        let legacy = server
            .mock("GET", SEARCH_UNIVERSAL_ABSOLUTE_PATH)
            .expect(0)
            .create_async()
            .await;

        let client = GraylogClient::new(&search_config(&server.url())).unwrap();
        let (from, to) = window();
        let err = client.search("level:3", from, to, None).await.unwrap_err();

        legacy.assert_async().await;
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_bodies_fail_the_query() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .with_status(200)
            .with_body("<html>definitely not json</html>")
            .create_async()
            .await;

        let client = GraylogClient::new(&search_config(&server.url())).unwrap();
        let (from, to) = window();
        let err = client.search("level:3", from, to, None).await.unwrap_err();
        assert!(matches!(err, BackendError::Body(_)));
    }

    #[tokio::test]
    async fn row_width_mismatch_fails_instead_of_misaligning() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .with_status(200)
            .with_body(
                json!({
                    "schema": [{"field": "timestamp"}, {"field": "message"}],
                    "datarows": [["2024-02-20T10:00:00.000Z", "ok", "extra column"]],
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GraylogClient::new(&search_config(&server.url())).unwrap();
        let (from, to) = window();
        let err = client.search("level:3", from, to, None).await.unwrap_err();
        assert!(matches!(err, BackendError::Body(_)));
    }

    #[tokio::test]
    async fn legacy_and_modern_surfaces_normalize_identically() {
        let (from, to) = window();

        let mut modern_server = mockito::Server::new_async().await;
        modern_server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .with_status(200)
            .with_body(
                json!({
                    "schema": [{"field": "timestamp"}, {"field": "message"}],
                    "datarows": [["2024-02-20T10:00:00.000Z", "boom"]],
                })
                .to_string(),
            )
            .create_async()
            .await;
        let modern_client = GraylogClient::new(&search_config(&modern_server.url())).unwrap();
        let from_modern = modern_client.search("q", from, to, None).await.unwrap();

        let mut legacy_server = mockito::Server::new_async().await;
        legacy_server
            .mock("POST", SEARCH_MESSAGES_PATH)
            .with_status(404)
            .create_async()
            .await;
        legacy_server
            .mock("GET", SEARCH_UNIVERSAL_ABSOLUTE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "messages": [
                        {"message": {"timestamp": "2024-02-20T10:00:00.000Z", "message": "boom"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let legacy_client = GraylogClient::new(&search_config(&legacy_server.url())).unwrap();
        let from_legacy = legacy_client.search("q", from, to, None).await.unwrap();

        assert_eq!(from_modern, from_legacy);
    }
}
