//! Schema-driven transfer of tables between ClickHouse and CSV files.

pub mod clickhouse;
pub mod config;
pub mod data_transfer;
pub mod db_types;
pub mod error;

pub use config::{ConnectionConfig, Protocol};
pub use error::{ErrorKind, ErrorReport, Result, TransferError};
