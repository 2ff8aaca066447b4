use crate::data_transfer::database_source::ClickHouseSource;
use crate::data_transfer::selection::SelectionChange;
use crate::data_transfer::source::SourceKind;
use crate::error::ErrorReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    DatabaseToFile,
    FileToDatabase,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::DatabaseToFile => "db_to_file",
            TransferDirection::FileToDatabase => "file_to_db",
        }
    }

    /// The kind of source a session in this direction reads from.
    pub fn source_kind(&self) -> SourceKind {
        match self {
            TransferDirection::DatabaseToFile => SourceKind::Database,
            TransferDirection::FileToDatabase => SourceKind::File,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    #[default]
    Idle,
    SourceLoaded,
    SchemaChosen,
    PreviewReady,
    Transferring,
    Done,
    Error,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::SourceLoaded => "source_loaded",
            TransferState::SchemaChosen => "schema_chosen",
            TransferState::PreviewReady => "preview_ready",
            TransferState::Transferring => "transferring",
            TransferState::Done => "done",
            TransferState::Error => "error",
        }
    }

    /// States from which a full transfer may be started.
    pub fn can_start_transfer(&self) -> bool {
        matches!(
            self,
            TransferState::SchemaChosen | TransferState::PreviewReady | TransferState::Done
        )
    }
}

/// Where a transfer writes to. The variant must agree with the session direction.
#[derive(Clone)]
pub enum TransferTarget {
    File {
        path: PathBuf,
    },
    Table {
        database: ClickHouseSource,
        table: String,
        /// Sorting key columns; empty means `ORDER BY tuple()`.
        order_by: Vec<String>,
    },
}

impl TransferTarget {
    pub fn direction(&self) -> TransferDirection {
        match self {
            TransferTarget::File { .. } => TransferDirection::DatabaseToFile,
            TransferTarget::Table { .. } => TransferDirection::FileToDatabase,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TransferTarget::File { path } => path.display().to_string(),
            TransferTarget::Table { table, .. } => table.trim().to_string(),
        }
    }
}

/// `percent` is `None` while the amount of work is unknown.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub percent: Option<u8>,
    pub rows: u64,
}

impl TransferProgress {
    pub fn started() -> Self {
        Self {
            percent: Some(0),
            rows: 0,
        }
    }

    pub fn indeterminate(rows: u64) -> Self {
        Self {
            percent: None,
            rows,
        }
    }

    pub fn at(percent: u8, rows: u64) -> Self {
        Self {
            percent: Some(percent.min(100)),
            rows,
        }
    }

    pub fn finished(rows: u64) -> Self {
        Self::at(100, rows)
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TransferReport {
    pub session_id: String,
    pub direction: TransferDirection,
    pub source: String,
    pub destination: String,
    pub columns: Vec<String>,
    pub rows_written: u64,
    pub batches: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Point-in-time view of a session, for printing or polling.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub direction: TransferDirection,
    pub state: TransferState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<TransferState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub selection: SelectionChange,
    pub preview_rows: usize,
    pub progress: TransferProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}
