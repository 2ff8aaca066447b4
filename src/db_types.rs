// =====================================================
// COMMON COLUMN, SCHEMA AND ROW TYPES
// =====================================================

use crate::error::{Result, TransferError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashSet;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub type JsonRow = Map<String, JsonValue>;

// --- Type Tag ---
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Integer64,
    Float64,
    Date,
    DateTime,
    #[default]
    String,
}

impl TypeTag {
    /// Name used when this tag is rendered into ClickHouse DDL.
    pub fn clickhouse_name(&self) -> &'static str {
        match self {
            TypeTag::Integer64 => "Int64",
            TypeTag::Float64 => "Float64",
            TypeTag::Date => "Date",
            TypeTag::DateTime => "DateTime",
            TypeTag::String => "String",
        }
    }

    pub fn from_clickhouse(declared: &str) -> TypeTag {
        let inner = unwrap_type_modifiers(declared.trim());
        let base = inner.split('(').next().unwrap_or(inner).trim();

        let integer = base
            .strip_prefix("UInt")
            .or_else(|| base.strip_prefix("Int"))
            .map(|bits| !bits.is_empty() && bits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);

        if integer {
            TypeTag::Integer64
        } else if base.starts_with("Float") || base.starts_with("Decimal") {
            TypeTag::Float64
        } else if base == "Date" || base == "Date32" {
            TypeTag::Date
        } else if base == "DateTime" || base == "DateTime64" {
            TypeTag::DateTime
        } else {
            TypeTag::String
        }
    }
}

fn unwrap_type_modifiers(declared: &str) -> &str {
    let mut current = declared;
    loop {
        let stripped = ["Nullable(", "LowCardinality("]
            .iter()
            .find_map(|prefix| current.strip_prefix(prefix))
            .and_then(|rest| rest.strip_suffix(')'));
        match stripped {
            Some(inner) => current = inner.trim(),
            None => return current,
        }
    }
}

// --- Column ---
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub type_tag: TypeTag,
    pub declared_type: String,
    /// First non-empty sampled value; only set for inferred columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

impl Column {
    /// Column whose type came from CSV inference.
    pub fn inferred(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            type_tag,
            declared_type: type_tag.clickhouse_name().to_string(),
            sample: None,
        }
    }

    pub fn with_sample(mut self, sample: Option<String>) -> Self {
        self.sample = sample;
        self
    }

    /// Column as reported by the database; the declared type is kept verbatim.
    pub fn declared(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        Self {
            name: name.into(),
            type_tag: TypeTag::from_clickhouse(&declared_type),
            declared_type,
            sample: None,
        }
    }
}

// --- Schema ---
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.trim().is_empty() {
                return Err(TransferError::validation("Column names must not be empty"));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TransferError::validation(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Sub-schema in the order of `names`.
    pub fn project(&self, names: &[String]) -> Result<Schema> {
        let columns = names
            .iter()
            .map(|name| {
                self.index_of(name)
                    .map(|index| self.columns[index].clone())
                    .ok_or_else(|| {
                        TransferError::validation(format!("Unknown column '{}'", name))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Schema::new(columns)
    }

    fn projection_indices(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.index_of(name).ok_or_else(|| {
                    TransferError::validation(format!("Unknown column '{}'", name))
                })
            })
            .collect()
    }
}

// --- Value ---
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Value {
    /// Parses a CSV cell. Empty cells are null; cells that do not fit the
    /// tag are kept as text.
    pub fn from_text(raw: &str, tag: TypeTag) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }

        let parsed = match tag {
            TypeTag::Integer64 => parse_integer(raw).map(Value::Integer),
            TypeTag::Float64 => parse_number(raw).map(Value::Float),
            TypeTag::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .ok()
                .map(Value::Date),
            TypeTag::DateTime => parse_datetime(raw).map(Value::DateTime),
            TypeTag::String => None,
        };

        parsed.unwrap_or_else(|| Value::Text(raw.to_string()))
    }

    /// Parses one field of a JSONEachRow object returned by the database.
    pub fn from_json(value: &JsonValue, tag: TypeTag) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::String(raw) if tag == TypeTag::String => Value::Text(raw.clone()),
            JsonValue::String(raw) => Value::from_text(raw, tag),
            JsonValue::Number(number) => match tag {
                TypeTag::Integer64 => number
                    .as_i64()
                    .map(Value::Integer)
                    .unwrap_or_else(|| Value::Text(number.to_string())),
                TypeTag::Float64 => number
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or_else(|| Value::Text(number.to_string())),
                _ => Value::Text(number.to_string()),
            },
            JsonValue::Bool(flag) => Value::Text(flag.to_string()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_csv_cell(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Date(v) => v.format(DATE_FORMAT).to_string(),
            Value::DateTime(v) => v.format(DATETIME_FORMAT).to_string(),
            Value::Text(v) => v.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Integer(v) => JsonValue::Number(Number::from(*v)),
            Value::Float(v) => Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Date(_) | Value::DateTime(_) => JsonValue::String(self.to_csv_cell()),
            Value::Text(v) => JsonValue::String(v.clone()),
        }
    }
}

/// Accepts plain numeric literals only; `inf` and `NaN` are not numbers here.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    // "3.0" counts as an integer; keep it if it fits.
    parse_number(trimmed)
        .filter(|value| value.fract() == 0.0 && value.abs() < i64::MAX as f64)
        .map(|value| value as i64)
}

/// `YYYY-MM-DD[T ]HH:MM:SS`, optionally followed by a UTC offset, which is
/// applied. Fractional seconds do not fit a `DateTime` column and are
/// rejected, as is anything else after the seconds.
fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let head = trimmed.get(..19)?;
    if trimmed.len() == head.len() {
        let normalized = head.replacen('T', " ", 1);
        return NaiveDateTime::parse_from_str(&normalized, DATETIME_FORMAT).ok();
    }

    let normalized = trimmed.replacen(' ', "T", 1);
    let parsed = DateTime::parse_from_rfc3339(&normalized).ok()?;
    if parsed.nanosecond() != 0 {
        return None;
    }
    Some(parsed.naive_utc())
}

// --- Rows ---
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn from_text_cells<'a, I>(schema: &Schema, cells: I) -> Row
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cells = cells.into_iter();
        let values = schema
            .columns()
            .iter()
            .map(|column| {
                cells
                    .next()
                    .map(|cell| Value::from_text(cell, column.type_tag))
                    .unwrap_or(Value::Null)
            })
            .collect();
        Row { values }
    }

    pub fn from_json(schema: &Schema, object: &JsonRow) -> Row {
        let values = schema
            .columns()
            .iter()
            .map(|column| {
                object
                    .get(&column.name)
                    .map(|value| Value::from_json(value, column.type_tag))
                    .unwrap_or(Value::Null)
            })
            .collect();
        Row { values }
    }

    /// JSON object in schema column order; null cells are left out so the
    /// database fills in its column defaults.
    pub fn to_json(&self, schema: &Schema) -> JsonRow {
        let mut object = Map::with_capacity(schema.len());
        for (column, value) in schema.columns().iter().zip(&self.values) {
            if value.is_null() {
                continue;
            }
            object.insert(column.name.clone(), value.to_json());
        }
        object
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn from_json_rows(schema: Schema, objects: &[JsonRow]) -> Self {
        let rows = objects
            .iter()
            .map(|object| Row::from_json(&schema, object))
            .collect();
        Self { schema, rows }
    }

    pub fn to_json_rows(&self) -> Vec<JsonRow> {
        self.rows.iter().map(|row| row.to_json(&self.schema)).collect()
    }

    /// Keeps only `names`, in that order.
    pub fn project(&self, names: &[String]) -> Result<RowSet> {
        let indices = self.schema.projection_indices(names)?;
        let schema = self.schema.project(names)?;
        let rows = self
            .rows
            .iter()
            .map(|row| {
                Row::new(
                    indices
                        .iter()
                        .map(|index| row.get(*index).cloned().unwrap_or(Value::Null))
                        .collect(),
                )
            })
            .collect();
        Ok(RowSet { schema, rows })
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }
}

// --- Join ---
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum JoinCondition {
    /// Free-text boolean expression inserted into the query as written.
    Predicate { expression: String },
    /// `<base>.<left_column> = <target>.<right_column>`, rendered with quoted identifiers.
    Columns {
        left_column: String,
        right_column: String,
    },
}

impl JoinCondition {
    pub fn predicate(expression: impl Into<String>) -> Self {
        JoinCondition::Predicate {
            expression: expression.into(),
        }
    }

    pub fn columns(left_column: impl Into<String>, right_column: impl Into<String>) -> Self {
        JoinCondition::Columns {
            left_column: left_column.into(),
            right_column: right_column.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            JoinCondition::Predicate { expression } => expression.trim().is_empty(),
            JoinCondition::Columns {
                left_column,
                right_column,
            } => left_column.trim().is_empty() || right_column.trim().is_empty(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    pub target_table: String,
    pub condition: JoinCondition,
}
