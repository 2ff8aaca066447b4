// =====================================================
// ClickHouse NATIVE HTTP OPERATIONS
// =====================================================

use crate::config::ConnectionConfig;
use crate::db_types::JsonRow;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use clickhouse::Client;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;

/// The database as seen by the adapters: statements in, rows or text out.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Runs a read query and returns one JSON object per row, in result order.
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<JsonRow>>;

    /// Runs a read query and returns the raw body in the given output format.
    async fn fetch_text(&self, sql: &str, format: &str) -> Result<String>;

    /// Runs a statement that returns no rows (DDL).
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Bulk insert of row objects.
    async fn insert_rows(&self, table: &str, rows: &[JsonRow]) -> Result<()>;
}

// --- Connection ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn create_client(config: &ConnectionConfig) -> Result<Client> {
    config.validate()?;

    let mut client = Client::default()
        .with_url(config.base_url())
        .with_user(&config.username);

    if !config.token.is_empty() {
        client = client.with_password(&config.token);
    }

    if !config.database.trim().is_empty() {
        client = client.with_database(&config.database);
    }

    Ok(client)
}

pub async fn test_connection(config: &ConnectionConfig) -> Result<()> {
    let client = create_client(config)?;

    let result: u8 = client.query("SELECT 1").fetch_one().await?;

    if result == 1 {
        Ok(())
    } else {
        Err(TransferError::query(
            "ClickHouse returned unexpected result during connection test",
        ))
    }
}

/// Round-trip check used before a database source is opened.
pub async fn check_connection(config: &ConnectionConfig) -> ConnectionCheck {
    match test_connection(config).await {
        Ok(()) => {
            log::info!("ClickHouse reachable at {}", config.base_url());
            ConnectionCheck {
                success: true,
                message: None,
            }
        }
        Err(error) => {
            log::warn!("ClickHouse connection check failed: {}", error);
            ConnectionCheck {
                success: false,
                message: Some(error.to_string()),
            }
        }
    }
}

// --- Raw HTTP Query Execution (to pick output formats the clickhouse crate does not expose) ---

pub struct HttpQueryService {
    config: ConnectionConfig,
    http: reqwest::Client,
}

impl HttpQueryService {
    /// Each call builds a fresh HTTP client; handles are never shared across
    /// configuration changes.
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransferError::connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn into_shared(self) -> Arc<dyn QueryService> {
        Arc::new(self)
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let mut rb = self
            .http
            .post(self.config.base_url())
            .query(&[("user", &self.config.username)]);

        if !self.config.token.is_empty() {
            rb = rb.query(&[("password", &self.config.token)]);
        }

        if !self.config.database.trim().is_empty() {
            rb = rb.query(&[("database", &self.config.database)]);
        }

        rb
    }

    async fn send(&self, rb: reqwest::RequestBuilder) -> Result<String> {
        let response = rb.send().await?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, err_body.trim()));
        }

        Ok(response.text().await?)
    }
}

fn classify_http_failure(status: StatusCode, body: &str) -> TransferError {
    let message = format!("ClickHouse error ({}): {}", status, body);
    // 516 is ClickHouse's AUTHENTICATION_FAILED surfaced as an HTTP status.
    if matches!(status.as_u16(), 401 | 403 | 516) {
        TransferError::Connection(message)
    } else {
        TransferError::Query(message)
    }
}

fn strip_statement_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

pub fn parse_json_each_row(body: &str) -> Result<Vec<JsonRow>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<JsonRow>(line).map_err(|e| {
                TransferError::query(format!("Failed to parse JSON row ({}): {}", line, e))
            })
        })
        .collect()
}

pub fn encode_json_each_row(rows: &[JsonRow]) -> Result<String> {
    let mut body = String::new();
    for row in rows {
        let line = serde_json::to_string(row)
            .map_err(|e| TransferError::validation(format!("Failed to encode JSON row: {}", e)))?;
        body.push_str(&line);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<JsonRow>> {
        let body = self.fetch_text(sql, "JSONEachRow").await?;
        parse_json_each_row(&body)
    }

    async fn fetch_text(&self, sql: &str, format: &str) -> Result<String> {
        let query = format!("{} FORMAT {}", strip_statement_terminator(sql), format);
        log::debug!("ClickHouse query: {}", query);
        self.send(self.request().body(query)).await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let statement = strip_statement_terminator(sql).to_string();
        log::debug!("ClickHouse statement: {}", statement);
        self.send(self.request().body(statement)).await?;
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[JsonRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let statement = format!("INSERT INTO {} FORMAT JSONEachRow", table);
        let body = encode_json_each_row(rows)?;
        log::debug!("ClickHouse insert: {} ({} rows)", statement, rows.len());
        self.send(self.request().query(&[("query", statement)]).body(body))
            .await?;
        Ok(())
    }
}
