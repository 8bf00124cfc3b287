use std::sync::LazyLock;

use datakit_config::shared::WarehouseConfig;
use regex::Regex;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Collapses literal VALUES tuples so logged SQL never carries row data.
static VALUES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"VALUES\s*\([^)]*\)(?:\s*,\s*\([^)]*\))*").expect("values regex is valid")
});

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("statement execution failed: {0}")]
    StatementExecutionFailed(String),

    #[error("no data available")]
    NoDataAvailable,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// SQL warehouse client speaking the workspace's HTTP statement API.
///
/// Statements run synchronously against the configured warehouse, catalog and
/// schema; the API call waits for completion and returns inline JSON rows.
#[derive(Debug, Clone)]
pub struct WarehouseClient {
    client: Client,
    workspace_url: String,
    warehouse_id: String,
    access_token: String,
    catalog: String,
    schema: String,
}

#[derive(Debug, Serialize)]
struct ExecuteStatementRequest {
    statement: String,
    warehouse_id: String,
    catalog: String,
    schema: String,
    wait_timeout: String,
    on_wait_timeout: String,
    format: String,
    disposition: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteStatementResponse {
    status: StatementStatus,
    result: Option<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<ErrorInfo>,
}

#[derive(Debug, Deserialize)]
struct ErrorInfo {
    message: String,
}

/// Inline result of a completed query.
#[derive(Debug, Deserialize)]
pub struct StatementResult {
    pub row_count: Option<i64>,
    pub data_array: Option<Vec<Vec<serde_json::Value>>>,
}

impl WarehouseClient {
    pub fn new(config: &WarehouseConfig) -> WarehouseClient {
        WarehouseClient {
            client: Client::new(),
            workspace_url: config.workspace_url.clone(),
            warehouse_id: config.warehouse_id.clone(),
            access_token: config.access_token.expose_secret().to_owned(),
            catalog: config.catalog.clone(),
            schema: config.schema.clone(),
        }
    }

    async fn execute_sql(&self, sql: &str) -> Result<ExecuteStatementResponse, WarehouseError> {
        info!("executing warehouse sql: {}", VALUES_RE.replace(sql, "VALUES (...)"));

        let request = ExecuteStatementRequest {
            statement: sql.to_owned(),
            warehouse_id: self.warehouse_id.clone(),
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            wait_timeout: "50s".to_owned(),
            on_wait_timeout: "CANCEL".to_owned(),
            format: "JSON_ARRAY".to_owned(),
            disposition: "INLINE".to_owned(),
        };

        let url = format!("{}/api/2.0/sql/statements", self.workspace_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(WarehouseError::StatementExecutionFailed(error_text));
        }

        let result: ExecuteStatementResponse = response.json().await?;

        if result.status.state != "SUCCEEDED" {
            let detail = result
                .status
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "no error details".to_owned());
            return Err(WarehouseError::StatementExecutionFailed(format!(
                "statement finished in state {}: {detail}",
                result.status.state
            )));
        }

        Ok(result)
    }

    /// Executes a DDL/DML statement and waits for completion.
    pub async fn execute_statement(&self, sql: &str) -> Result<(), WarehouseError> {
        self.execute_sql(sql).await.map(|_| ())
    }

    /// Executes a query and returns its inline result rows.
    pub async fn execute_query(&self, sql: &str) -> Result<StatementResult, WarehouseError> {
        let response = self.execute_sql(sql).await?;
        response.result.ok_or(WarehouseError::NoDataAvailable)
    }
}
