//! In-memory stand-in for the ClickHouse HTTP interface.
//!
//! Understands the handful of statement shapes the adapters emit: SHOW
//! TABLES, DESCRIBE TABLE, SELECT .. FROM .. [JOIN ..] [LIMIT n], CREATE
//! TABLE IF NOT EXISTS, and JSONEachRow inserts.

use crate::clickhouse::QueryService;
use crate::db_types::JsonRow;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<(String, String)>,
    pub rows: Vec<JsonRow>,
}

#[derive(Default)]
pub struct MemoryQueryService {
    tables: Mutex<BTreeMap<String, MemoryTable>>,
    statements: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl MemoryQueryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_table(&self, name: &str, columns: &[(&str, &str)], rows: Vec<JsonRow>) {
        let table = MemoryTable {
            columns: columns
                .iter()
                .map(|(name, declared)| (name.to_string(), declared.to_string()))
                .collect(),
            rows,
        };
        self.tables.lock().unwrap().insert(name.to_string(), table);
    }

    /// `events(id UInt64, label String)` with `count` rows.
    pub fn add_events_table(&self, count: usize) {
        let rows = (0..count)
            .map(|i| object(json!({"id": i.to_string(), "label": format!("event-{}", i)})))
            .collect();
        self.add_table("events", &[("id", "UInt64"), ("label", "String")], rows);
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.tables.lock().unwrap().get(name).cloned()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Every following call fails with a query error carrying `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn record(&self, statement: &str) -> Result<()> {
        self.statements.lock().unwrap().push(statement.to_string());
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(TransferError::query(message.clone())),
            None => Ok(()),
        }
    }

    fn select(&self, sql: &str) -> Result<(Vec<String>, Vec<JsonRow>)> {
        let body = sql
            .strip_prefix("SELECT ")
            .ok_or_else(|| TransferError::query(format!("Unsupported statement: {}", sql)))?;
        let (column_list, rest) = body
            .split_once(" FROM ")
            .ok_or_else(|| TransferError::query("SELECT without FROM"))?;
        let columns = column_list.split(", ").map(unquote).collect::<Vec<_>>();
        let table_name = unquote(rest.split(' ').next().unwrap_or_default());
        let limit = rest
            .rsplit_once(" LIMIT ")
            .and_then(|(_, limit)| limit.trim().parse::<usize>().ok());

        let tables = self.tables.lock().unwrap();
        let table = tables
            .get(&table_name)
            .ok_or_else(|| TransferError::query(format!("Table {} doesn't exist", table_name)))?;

        for column in &columns {
            if !table.columns.iter().any(|(name, _)| name == column) {
                return Err(TransferError::query(format!("Missing column {}", column)));
            }
        }

        let rows = table
            .rows
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        (
                            column.clone(),
                            row.get(column).cloned().unwrap_or(JsonValue::Null),
                        )
                    })
                    .collect::<JsonRow>()
            })
            .collect();
        Ok((columns, rows))
    }
}

pub fn object(value: JsonValue) -> JsonRow {
    value.as_object().cloned().unwrap_or_default()
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('`').to_string()
}

fn json_to_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl QueryService for MemoryQueryService {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<JsonRow>> {
        self.record(sql)?;

        if sql == "SHOW TABLES" {
            let tables = self.tables.lock().unwrap();
            return Ok(tables.keys().map(|name| object(json!({ "name": name }))).collect());
        }

        if let Some(name) = sql.strip_prefix("DESCRIBE TABLE ") {
            let name = unquote(name);
            let tables = self.tables.lock().unwrap();
            let table = tables
                .get(&name)
                .ok_or_else(|| TransferError::query(format!("Table {} doesn't exist", name)))?;
            return Ok(table
                .columns
                .iter()
                .map(|(name, declared)| object(json!({"name": name, "type": declared, "default_type": ""})))
                .collect());
        }

        self.select(sql).map(|(_, rows)| rows)
    }

    async fn fetch_text(&self, sql: &str, format: &str) -> Result<String> {
        self.record(sql)?;
        if format != "CSVWithNames" {
            return Err(TransferError::query(format!("Unsupported format {}", format)));
        }

        let (columns, rows) = self.select(sql)?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&columns)?;
        for row in &rows {
            writer.write_record(columns.iter().map(|column| json_to_cell(&row[column.as_str()])))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TransferError::query(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TransferError::query(e.to_string()))
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.record(sql)?;

        let rest = sql
            .strip_prefix("CREATE TABLE IF NOT EXISTS ")
            .ok_or_else(|| TransferError::query(format!("Unsupported statement: {}", sql)))?;
        let (name, rest) = rest
            .split_once(" (")
            .ok_or_else(|| TransferError::query("CREATE TABLE without column list"))?;
        let (column_list, _) = rest
            .split_once(") ENGINE")
            .ok_or_else(|| TransferError::query("CREATE TABLE without engine"))?;
        let columns = column_list
            .split(", ")
            .filter_map(|definition| definition.split_once(' '))
            .map(|(name, declared)| (unquote(name), declared.to_string()))
            .collect();

        self.tables
            .lock()
            .unwrap()
            .entry(unquote(name))
            .or_insert_with(|| MemoryTable {
                columns,
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[JsonRow]) -> Result<()> {
        self.record(&format!("INSERT INTO {} FORMAT JSONEachRow", table))?;

        let name = unquote(table);
        let mut tables = self.tables.lock().unwrap();
        let target = tables
            .get_mut(&name)
            .ok_or_else(|| TransferError::query(format!("Table {} doesn't exist", name)))?;
        target.rows.extend(rows.iter().cloned());
        Ok(())
    }
}
