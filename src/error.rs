//! Error types shared by the adapters and the transfer session.

use serde::Serialize;
use thiserror::Error;

/// Closed classification of every failure the pipeline can report.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Query,
    Parse,
    Validation,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Query => "query",
            ErrorKind::Parse => "parse",
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    /// Unreachable host, refused connection, authentication failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed SQL or predicate, missing table or column, rejected insert.
    #[error("Query error: {0}")]
    Query(String),

    /// Malformed input file.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request rejected before any I/O was issued.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError {
    pub fn connection(message: impl Into<String>) -> Self {
        TransferError::Connection(message.into())
    }

    pub fn query(message: impl Into<String>) -> Self {
        TransferError::Query(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        TransferError::Parse(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TransferError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Connection(_) => ErrorKind::Connection,
            TransferError::Query(_) => ErrorKind::Query,
            TransferError::Parse(_) => ErrorKind::Parse,
            TransferError::Validation(_) => ErrorKind::Validation,
            TransferError::Io(_) => ErrorKind::Io,
        }
    }

    /// True when repeating the same request may succeed without user action.
    /// Nothing in this crate retries on its own; callers decide.
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, TransferError::Connection(_))
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            TransferError::Connection(_) => 2,
            TransferError::Query(_) => 3,
            TransferError::Parse(_) => 4,
            TransferError::Validation(_) => 5,
            TransferError::Io(_) => 6,
        }
    }

    /// Snapshot suitable for showing next to the form that triggered it.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            retry_safe: self.is_retry_safe(),
        }
    }
}

impl From<csv::Error> for TransferError {
    fn from(error: csv::Error) -> Self {
        if matches!(error.kind(), csv::ErrorKind::Io(_)) {
            return TransferError::Io(error.into());
        }
        TransferError::Parse(error.to_string())
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            TransferError::Connection(format!("HTTP request failed: {}", error))
        } else {
            TransferError::Query(format!("HTTP response failed: {}", error))
        }
    }
}

impl From<clickhouse::error::Error> for TransferError {
    fn from(error: clickhouse::error::Error) -> Self {
        match error {
            clickhouse::error::Error::Network(inner) => {
                TransferError::Connection(format!("ClickHouse unreachable: {}", inner))
            }
            other => TransferError::Query(format!("ClickHouse error: {}", other)),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_safe: bool,
}

pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests;
