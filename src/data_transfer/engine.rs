use crate::data_transfer::database_source::ClickHouseSource;
use crate::data_transfer::file_source::CsvSource;
use crate::data_transfer::models::TransferProgress;
use crate::data_transfer::source::SchemaSource;
use crate::db_types::JoinSpec;
use crate::error::{Result, TransferError};
use serde::Serialize;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;

pub const TRANSFER_BATCH_SIZE: usize = 1_000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineStepResult {
    pub destination: String,
    pub written_rows: u64,
    pub batches: usize,
}

/// Runs the export query once and writes the CSV body to `path`. The row
/// count is unknown until the body arrives, so progress stays indeterminate
/// until then.
pub async fn export_to_file(
    source: &dyn SchemaSource,
    projection: &[String],
    join: Option<&JoinSpec>,
    path: &Path,
    progress: &watch::Sender<TransferProgress>,
) -> Result<EngineStepResult> {
    progress.send_replace(TransferProgress::indeterminate(0));

    let body = source.export_rows(projection, join).await?;
    let written_rows = count_records(&body)?;

    let mut writer = create_file_sink_writer(path).await?;
    writer.write_all(body.as_bytes()).await.map_err(|e| {
        TransferError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to write CSV sink output: {}", e),
        ))
    })?;
    writer.flush().await?;

    progress.send_replace(TransferProgress::finished(written_rows));
    log::info!(
        "Exported {} rows from {} to {}",
        written_rows,
        source.label(),
        path.display()
    );

    Ok(EngineStepResult {
        destination: path.display().to_string(),
        written_rows,
        batches: 1,
    })
}

/// Creates the target table from the projected file schema, then streams the
/// file into it `TRANSFER_BATCH_SIZE` rows at a time.
pub async fn ingest_file(
    source: &CsvSource,
    projection: &[String],
    database: &ClickHouseSource,
    table: &str,
    order_by: &[String],
    progress: &watch::Sender<TransferProgress>,
) -> Result<EngineStepResult> {
    let mut reader = source.batches(projection, TRANSFER_BATCH_SIZE)?;
    let schema = reader.schema().clone();
    database.create_table(table, &schema, order_by).await?;

    let mut written_rows = 0u64;
    let mut batches = 0usize;
    while let Some(batch) = reader.next_batch()? {
        database.insert_rows(table, &batch).await?;
        written_rows = written_rows.saturating_add(batch.len() as u64);
        batches += 1;
        progress.send_replace(TransferProgress::at(reader.progress_pct(), written_rows));
        log::debug!("Inserted batch {} into {} ({} rows so far)", batches, table, written_rows);
    }

    progress.send_replace(TransferProgress::finished(written_rows));
    log::info!(
        "Imported {} rows from {} into {} in {} batches",
        written_rows,
        source.handle().name(),
        table.trim(),
        batches
    );

    Ok(EngineStepResult {
        destination: table.trim().to_string(),
        written_rows,
        batches,
    })
}

async fn create_file_sink_writer(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TransferError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create sink directory '{}': {}", parent.display(), e),
                ))
            })?;
        }
    }

    let file = File::create(path).await.map_err(|e| {
        TransferError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create sink file '{}': {}", path.display(), e),
        ))
    })?;
    Ok(BufWriter::new(file))
}

/// Data records in a CSV body with a header row.
fn count_records(body: &str) -> Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());
    let mut record = csv::StringRecord::new();
    let mut count = 0u64;
    while reader.read_record(&mut record)? {
        count += 1;
    }
    Ok(count)
}
