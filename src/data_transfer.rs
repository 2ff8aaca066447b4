pub mod database_source;
pub mod engine;
pub mod file_source;
pub mod inference;
pub mod models;
pub mod selection;
pub mod session;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use database_source::{ClickHouseSource, TableSource};
pub use file_source::{CsvSource, FileHandle};
pub use models::{TransferDirection, TransferProgress, TransferReport, TransferState, TransferTarget};
pub use session::TransferSession;
pub use source::{SchemaSource, Source, SourceKind};
