use crate::clickhouse::{HttpQueryService, QueryService};
use crate::config::ConnectionConfig;
use crate::data_transfer::source::SchemaSource;
use crate::db_types::{Column, JoinCondition, JoinSpec, RowSet, Schema};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use std::sync::Arc;

pub const PREVIEW_ROW_LIMIT: usize = 100;

/// Database side of a transfer. Owns the query service handle; cloning shares it.
#[derive(Clone)]
pub struct ClickHouseSource {
    service: Arc<dyn QueryService>,
}

impl ClickHouseSource {
    pub fn new(service: Arc<dyn QueryService>) -> Self {
        Self { service }
    }

    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        Ok(Self::new(HttpQueryService::connect(config)?.into_shared()))
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = self.service.fetch_rows("SHOW TABLES").await?;
        rows.iter()
            .map(|row| {
                row.get("name")
                    .and_then(|value| value.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| TransferError::query("SHOW TABLES returned a row without a name"))
            })
            .collect()
    }

    pub async fn describe_table(&self, table: &str) -> Result<Schema> {
        let table = normalize_name(table, "table")?;
        let query = format!("DESCRIBE TABLE {}", quote_identifier(table));
        let rows = self.service.fetch_rows(&query).await?;

        let columns = rows
            .iter()
            .map(|row| {
                let name = row.get("name").and_then(|value| value.as_str());
                let declared = row.get("type").and_then(|value| value.as_str());
                match (name, declared) {
                    (Some(name), Some(declared)) => Ok(Column::declared(name, declared)),
                    _ => Err(TransferError::query(format!(
                        "DESCRIBE TABLE {} returned an incomplete column row",
                        table
                    ))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Described table {} ({} columns)", table, columns.len());
        Schema::new(columns)
    }

    /// `columns` is the projected schema; its order is the SELECT order.
    pub async fn preview_rows(
        &self,
        table: &str,
        columns: &Schema,
        join: Option<&JoinSpec>,
    ) -> Result<RowSet> {
        let query = build_select_query(table, &columns.names(), join, Some(PREVIEW_ROW_LIMIT))?;
        let objects = self.service.fetch_rows(&query).await?;

        let mut rows = RowSet::from_json_rows(columns.clone(), &objects);
        if rows.len() > PREVIEW_ROW_LIMIT {
            log::warn!(
                "Preview of {} returned {} rows; keeping the first {}",
                table,
                rows.len(),
                PREVIEW_ROW_LIMIT
            );
            rows.truncate(PREVIEW_ROW_LIMIT);
        }
        Ok(rows)
    }

    /// Full result as CSV with a header row. No row bound.
    pub async fn export_rows(
        &self,
        table: &str,
        columns: &[String],
        join: Option<&JoinSpec>,
    ) -> Result<String> {
        let query = build_select_query(table, columns, join, None)?;
        self.service.fetch_text(&query, "CSVWithNames").await
    }

    pub async fn create_table(&self, table: &str, schema: &Schema, order_by: &[String]) -> Result<()> {
        let statement = build_create_table_statement(table, schema, order_by)?;
        self.service.execute(&statement).await?;
        log::info!("Ensured table {} exists", table.trim());
        Ok(())
    }

    /// Sends the rows as one batch. Cells are not checked against column
    /// types; the database decides.
    pub async fn insert_rows(&self, table: &str, rows: &RowSet) -> Result<()> {
        let table = normalize_name(table, "table")?;
        if rows.is_empty() {
            return Ok(());
        }
        self.service
            .insert_rows(&quote_identifier(table), &rows.to_json_rows())
            .await
    }
}

/// A described table: the database half of a `Source`.
#[derive(Clone)]
pub struct TableSource {
    database: ClickHouseSource,
    table: String,
    schema: Schema,
}

impl TableSource {
    pub async fn open(database: ClickHouseSource, table: &str) -> Result<Self> {
        let table = normalize_name(table, "table")?.to_string();
        let schema = database.describe_table(&table).await?;
        Ok(Self {
            database,
            table,
            schema,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn database(&self) -> &ClickHouseSource {
        &self.database
    }
}

#[async_trait]
impl SchemaSource for TableSource {
    fn label(&self) -> String {
        format!("table {}", self.table)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn preview_rows(&self, projection: &[String], join: Option<&JoinSpec>) -> Result<RowSet> {
        let columns = self.schema.project(projection)?;
        self.database.preview_rows(&self.table, &columns, join).await
    }

    async fn export_rows(&self, projection: &[String], join: Option<&JoinSpec>) -> Result<String> {
        self.schema.project(projection)?;
        self.database.export_rows(&self.table, projection, join).await
    }
}

// --- Query construction ---

fn normalize_name<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TransferError::validation(format!("{} name is required", what)));
    }
    Ok(trimmed)
}

pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

pub fn render_join_clause(base_table: &str, join: &JoinSpec) -> Result<String> {
    let target = normalize_name(&join.target_table, "join table")?;
    if join.condition.is_blank() {
        return Err(TransferError::validation("Join condition is required"));
    }

    // Raw predicates go into the query untouched.
    let condition = match &join.condition {
        JoinCondition::Predicate { expression } => expression.trim().to_string(),
        JoinCondition::Columns {
            left_column,
            right_column,
        } => format!(
            "{}.{} = {}.{}",
            quote_identifier(base_table),
            quote_identifier(left_column.trim()),
            quote_identifier(target),
            quote_identifier(right_column.trim())
        ),
    };

    Ok(format!("JOIN {} ON {}", quote_identifier(target), condition))
}

pub fn build_select_query(
    table: &str,
    columns: &[String],
    join: Option<&JoinSpec>,
    limit: Option<usize>,
) -> Result<String> {
    let table = normalize_name(table, "table")?;
    if columns.is_empty() {
        return Err(TransferError::validation("At least one column must be selected"));
    }

    let column_list = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");

    let mut query = format!("SELECT {} FROM {}", column_list, quote_identifier(table));
    if let Some(join) = join {
        query.push(' ');
        query.push_str(&render_join_clause(table, join)?);
    }
    if let Some(limit) = limit {
        query.push_str(&format!(" LIMIT {}", limit));
    }
    Ok(query)
}

/// An empty `order_by` yields `ORDER BY tuple()`, which only suits small or
/// append-only tables.
pub fn build_create_table_statement(table: &str, schema: &Schema, order_by: &[String]) -> Result<String> {
    let table = normalize_name(table, "table")?;
    if schema.is_empty() {
        return Err(TransferError::validation(format!(
            "Cannot create table {} without columns",
            table
        )));
    }

    let columns = schema
        .columns()
        .iter()
        .map(|column| format!("{} {}", quote_identifier(&column.name), column.declared_type))
        .collect::<Vec<_>>()
        .join(", ");

    let sorting_key = if order_by.is_empty() {
        "tuple()".to_string()
    } else {
        if let Some(unknown) = order_by.iter().find(|name| !schema.contains(name)) {
            return Err(TransferError::validation(format!(
                "Order key column '{}' is not part of the table",
                unknown
            )));
        }
        format!(
            "({})",
            order_by
                .iter()
                .map(|name| quote_identifier(name))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree() ORDER BY {}",
        quote_identifier(table),
        columns,
        sorting_key
    ))
}
