//! Remote store client for the hosted database service.
//!
//! A thin wrapper over the service's REST row API: structured reads become
//! row filters, writes become inserts/patches/deletes keyed on the primary
//! key, and the change feed drives both the pull phase and the realtime
//! bridge. No raw SQL crosses the wire.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use pulperia_core::gateway::{FilterOp, Row, RunResult, Select};
use pulperia_core::sync::{primary_key_column, ChangeRow};

use crate::error::{RemoteStoreError, Result};
use crate::sql::{bind_statement, BoundStatement};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Reachability probes give up much sooner; a slow answer counts as down.
const PROBE_TIMEOUT_SECS: u64 = 5;
const MAX_LOG_BODY_CHARS: usize = 512;
/// Server-maintained change feed relation.
const CHANGE_FEED_TABLE: &str = "change_log";

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Client for the hosted relational database service.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteStore {
    /// Create a new remote store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the hosted service
    /// * `api_key` - The service API key sent with every request
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|_| RemoteStoreError::invalid_request("Invalid API key format"))?;
        headers.insert("apikey", key_value);
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RemoteStoreError::invalid_request("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    async fn check_status(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);
        if status.is_success() {
            return Ok(body);
        }
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            let message = match error.code {
                Some(code) => format!("{}: {}", code, error.message),
                None => error.message,
            };
            return Err(RemoteStoreError::api(status.as_u16(), message));
        }
        Err(RemoteStoreError::api(
            status.as_u16(),
            format!("Request failed: {}", body),
        ))
    }

    async fn parse_rows(response: reqwest::Response) -> Result<Vec<Row>> {
        let body = Self::check_status(response).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn filter_operand(value: &Value) -> String {
        match value {
            Value::String(v) => v.clone(),
            other => other.to_string(),
        }
    }

    fn select_query(select: &Select) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(columns) = &select.columns {
            query.push(("select".to_string(), columns.join(",")));
        }
        for filter in &select.filters {
            let operand = match filter.op {
                FilterOp::Eq => format!("eq.{}", Self::filter_operand(&filter.value)),
                FilterOp::Gt => format!("gt.{}", Self::filter_operand(&filter.value)),
                FilterOp::IsNull => "is.null".to_string(),
            };
            query.push((filter.column.clone(), operand));
        }
        if let Some((column, descending)) = &select.order_by {
            let direction = if *descending { "desc" } else { "asc" };
            query.push(("order".to_string(), format!("{}.{}", column, direction)));
        }
        if let Some(limit) = select.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        query
    }

    // ─────────────────────────────────────────────────────────────────────
    // Row operations
    // ─────────────────────────────────────────────────────────────────────

    /// Structured single-table read through the service's row filters.
    pub async fn select(&self, select: &Select) -> Result<Vec<Row>> {
        let response = self
            .client
            .get(self.table_url(&select.table))
            .headers(self.headers()?)
            .query(&Self::select_query(select))
            .send()
            .await?;
        Self::parse_rows(response).await
    }

    /// Plain insert; duplicate primary keys are rejected by the service.
    pub async fn insert(&self, table: &str, record: &Row) -> Result<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    /// Upsert by primary key. Provided columns overwrite, missing columns
    /// keep their stored values, so replaying the same row is harmless.
    pub async fn upsert(&self, table: &str, record: &Row) -> Result<()> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    /// Patch columns on the row matching `key`.
    pub async fn update(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
        patch: &Row,
    ) -> Result<u64> {
        let response = self
            .client
            .patch(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .query(&[(key_column, format!("eq.{}", key))])
            .json(patch)
            .send()
            .await?;
        let rows = Self::parse_rows(response).await?;
        Ok(rows.len() as u64)
    }

    /// Delete the row matching `key`. Deleting a missing row succeeds with
    /// zero affected rows.
    pub async fn delete(&self, table: &str, key_column: &str, key: &str) -> Result<u64> {
        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .query(&[(key_column, format!("eq.{}", key))])
            .send()
            .await?;
        let rows = Self::parse_rows(response).await?;
        Ok(rows.len() as u64)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Generic statement mapping
    // ─────────────────────────────────────────────────────────────────────

    /// Answer a bounded `SELECT` shape; anything richer is rejected and
    /// must be composed from multiple round-trips.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        match bind_statement(sql, params)? {
            BoundStatement::Select(select) => self.select(&select).await,
            _ => Err(RemoteStoreError::unsupported(
                "write statements go through run",
            )),
        }
    }

    /// Map a bounded write statement onto the row API.
    pub async fn run(&self, sql: &str, params: &[Value]) -> Result<RunResult> {
        match bind_statement(sql, params)? {
            BoundStatement::Select(_) => Err(RemoteStoreError::unsupported(
                "read statements go through query",
            )),
            BoundStatement::Insert {
                table,
                record,
                or_replace,
            } => {
                if or_replace {
                    self.upsert(&table, &record).await?;
                } else {
                    self.insert(&table, &record).await?;
                }
                Ok(RunResult {
                    changes: 1,
                    last_insert_rowid: None,
                })
            }
            BoundStatement::Update {
                table,
                key_column,
                key,
                patch,
            } => {
                let key = Self::filter_operand(&key);
                let changes = self.update(&table, &key_column, &key, &patch).await?;
                Ok(RunResult {
                    changes,
                    last_insert_rowid: None,
                })
            }
            BoundStatement::Delete {
                table,
                key_column,
                key,
            } => {
                let key = Self::filter_operand(&key);
                let changes = self.delete(&table, &key_column, &key).await?;
                Ok(RunResult {
                    changes,
                    last_insert_rowid: None,
                })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Change feed
    // ─────────────────────────────────────────────────────────────────────

    fn change_rows(rows: Vec<Row>) -> Result<Vec<ChangeRow>> {
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(RemoteStoreError::from))
            .collect()
    }

    /// Feed entries for one table with `seq` greater than `after_seq`.
    pub async fn changes_since(
        &self,
        table: &str,
        after_seq: i64,
        limit: u32,
    ) -> Result<Vec<ChangeRow>> {
        let select = Select::from(CHANGE_FEED_TABLE)
            .filter(pulperia_core::gateway::Filter::eq("table_name", table))
            .filter(pulperia_core::gateway::Filter::gt("seq", after_seq))
            .order_by("seq", false)
            .limit(limit);
        Self::change_rows(self.select(&select).await?)
    }

    /// Feed entries across every table, for the realtime bridge.
    pub async fn feed_since(&self, after_seq: i64, limit: u32) -> Result<Vec<ChangeRow>> {
        let select = Select::from(CHANGE_FEED_TABLE)
            .filter(pulperia_core::gateway::Filter::gt("seq", after_seq))
            .order_by("seq", false)
            .limit(limit);
        Self::change_rows(self.select(&select).await?)
    }

    /// Highest sequence currently in the feed; 0 when the feed is empty.
    pub async fn latest_seq(&self) -> Result<i64> {
        let select = Select::from(CHANGE_FEED_TABLE)
            .columns(vec!["seq".into()])
            .order_by("seq", true)
            .limit(1);
        let rows = self.select(&select).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("seq"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Replay one queued mutation with upsert-by-primary-key semantics, so
    /// replaying the same entry twice cannot corrupt remote state.
    pub async fn replay(
        &self,
        table: &str,
        operation: pulperia_core::sync::SyncOperation,
        record_id: &str,
        payload: &Row,
    ) -> Result<()> {
        use pulperia_core::sync::SyncOperation;
        match operation {
            SyncOperation::Insert | SyncOperation::Update => self.upsert(table, payload).await,
            SyncOperation::Delete => self
                .delete(table, primary_key_column(table), record_id)
                .await
                .map(|_| ()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reachability
    // ─────────────────────────────────────────────────────────────────────

    /// Lightweight reachability probe with a short deadline.
    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteStoreError::api(status.as_u16(), "health check failed"))
        }
    }
}
