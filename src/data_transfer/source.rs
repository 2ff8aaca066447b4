use crate::data_transfer::database_source::TableSource;
use crate::data_transfer::file_source::CsvSource;
use crate::db_types::{JoinSpec, RowSet, Schema};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What every loaded source can do, whichever side of the transfer it is on.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    fn label(&self) -> String;

    fn schema(&self) -> &Schema;

    /// At most `PREVIEW_ROW_LIMIT` rows of the projected columns.
    async fn preview_rows(&self, projection: &[String], join: Option<&JoinSpec>) -> Result<RowSet>;

    /// Every row of the projected columns as CSV with a header line.
    async fn export_rows(&self, projection: &[String], join: Option<&JoinSpec>) -> Result<String>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Database,
    File,
}

pub enum Source {
    Database(TableSource),
    File(CsvSource),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Database(_) => SourceKind::Database,
            Source::File(_) => SourceKind::File,
        }
    }

    pub fn as_schema_source(&self) -> &dyn SchemaSource {
        match self {
            Source::Database(source) => source,
            Source::File(source) => source,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.as_schema_source().schema()
    }

    pub fn label(&self) -> String {
        self.as_schema_source().label()
    }

    /// Table name for database sources; joins are only offered against these.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Source::Database(source) => Some(source.table()),
            Source::File(_) => None,
        }
    }
}

impl From<TableSource> for Source {
    fn from(source: TableSource) -> Self {
        Source::Database(source)
    }
}

impl From<CsvSource> for Source {
    fn from(source: CsvSource) -> Self {
        Source::File(source)
    }
}
