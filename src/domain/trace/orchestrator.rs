use anyhow::{Context, Result};
use serde_json::Map;
use tracing::{debug, error, info};

use crate::config::{SectionKey, TracerConfig};
use crate::core::client::graylog_client::GraylogClient;
use crate::domain::interval::service::ResolvedInterval;
use crate::domain::trace::message::{QueryResult, RunResult, RunSummary, SectionResult, SectionSummary};
use crate::domain::trace::{aggregator, noise_filter, normalizer};

/// Drives the whole pipeline: per section, per query, search ->
/// normalize -> filter -> (conditionally) aggregate, accumulating
/// counts at every level. A failed query is recorded inline and never
/// halts its siblings.
pub struct TraceRunner<'a> {
    client: &'a GraylogClient,
    config: &'a TracerConfig,
}

impl<'a> TraceRunner<'a> {
    pub fn new(client: &'a GraylogClient, config: &'a TracerConfig) -> Self {
        Self { client, config }
    }

    pub async fn run(
        &self,
        interval: &ResolvedInterval,
        request_fields: Option<&[String]>,
    ) -> Result<RunResult> {
        let mut sections = Map::new();
        let mut by_section = Map::new();
        let mut total_messages = 0;

        for (section, queries) in &self.config.sections {
            let section_result = self
                .run_section(*section, queries, interval, request_fields)
                .await;
            info!(
                section = section.as_str(),
                total = section_result.summary.total_messages,
                "section complete"
            );
            total_messages += section_result.summary.total_messages;
            by_section.insert(
                section.as_str().to_string(),
                serde_json::to_value(&section_result.summary)
                    .context("serializing section summary")?,
            );
            sections.insert(
                section.as_str().to_string(),
                serde_json::to_value(&section_result).context("serializing section result")?,
            );
        }

        Ok(RunResult {
            interval: interval.metadata(),
            sections,
            summary: RunSummary {
                total_messages,
                by_section,
            },
        })
    }

    async fn run_section(
        &self,
        section: SectionKey,
        queries: &[String],
        interval: &ResolvedInterval,
        request_fields: Option<&[String]>,
    ) -> SectionResult {
        if queries.is_empty() {
            return SectionResult::empty();
        }

        let mut results = Vec::with_capacity(queries.len());
        let mut section_messages = Vec::new();
        for (query_index, query) in queries.iter().enumerate() {
            let result = self
                .run_query(section, query_index, query, interval, request_fields)
                .await;
            if result.error.is_none() {
                section_messages.extend(result.messages.iter().cloned());
            }
            results.push(result);
        }

        let per_query: Vec<usize> = results.iter().map(QueryResult::count).collect();
        SectionResult {
            queries: queries.to_vec(),
            results,
            summary: SectionSummary {
                total_messages: section_messages.len(),
                per_query,
            },
            messages: section_messages,
        }
    }

    async fn run_query(
        &self,
        section: SectionKey,
        query_index: usize,
        query: &str,
        interval: &ResolvedInterval,
        request_fields: Option<&[String]>,
    ) -> QueryResult {
        debug!(section = section.as_str(), query_index, query, "running query");
        let schema_rows = match self
            .client
            .search(query, interval.from_utc, interval.to_utc, request_fields)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!(
                    section = section.as_str(),
                    query, "query failed: {e}"
                );
                return QueryResult::failure(query_index, query, e.to_string());
            }
        };

        let messages: Vec<_> = schema_rows
            .rows
            .iter()
            .map(|row| {
                normalizer::row_to_message(
                    &schema_rows.fields,
                    row,
                    query,
                    section,
                    &self.config.output_fields,
                )
            })
            .collect();
        let mut messages = noise_filter::apply(messages, &self.config.filter_keywords);
        if section.is_aggregated() && self.config.pods_bucket_seconds > 0 {
            messages = aggregator::aggregate_by_time_frame(
                messages,
                self.config.pods_bucket_seconds,
                section,
                query,
            );
        }
        QueryResult::success(query_index, query, messages)
    }
}
