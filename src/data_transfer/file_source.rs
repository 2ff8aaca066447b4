use crate::data_transfer::database_source::PREVIEW_ROW_LIMIT;
use crate::data_transfer::inference::{infer_schema, SAMPLE_ROW_LIMIT};
use crate::data_transfer::source::SchemaSource;
use crate::db_types::{JoinSpec, Row, RowSet, Schema};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

/// Where the bytes of an uploaded file come from.
#[derive(Debug, Clone)]
pub enum FileHandle {
    Path(PathBuf),
    Memory { name: String, bytes: Arc<[u8]> },
}

impl FileHandle {
    pub fn memory(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        FileHandle::Memory {
            name: name.into(),
            bytes: Arc::from(bytes),
        }
    }

    pub fn name(&self) -> String {
        match self {
            FileHandle::Path(path) => path.display().to_string(),
            FileHandle::Memory { name, .. } => name.clone(),
        }
    }

    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            FileHandle::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    TransferError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to open '{}': {}", path.display(), e),
                    ))
                })?;
                Ok(Box::new(file))
            }
            FileHandle::Memory { bytes, .. } => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }

    pub fn byte_len(&self) -> Result<u64> {
        match self {
            FileHandle::Path(path) => Ok(std::fs::metadata(path)?.len()),
            FileHandle::Memory { bytes, .. } => Ok(bytes.len() as u64),
        }
    }
}

/// A parsed CSV upload: inferred schema plus the first rows for display.
#[derive(Debug, Clone)]
pub struct CsvSource {
    handle: FileHandle,
    schema: Schema,
    preview: RowSet,
}

fn open_reader(handle: &FileHandle) -> Result<csv::Reader<Box<dyn Read + Send>>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(handle.open()?))
}

fn read_headers(reader: &mut csv::Reader<Box<dyn Read + Send>>, name: &str) -> Result<Vec<String>> {
    let headers = reader.headers()?.iter().map(str::to_string).collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(|header| header.is_empty()) {
        return Err(TransferError::parse(format!("{} has no header row", name)));
    }
    Ok(headers)
}

impl CsvSource {
    /// Reads the header and the first `SAMPLE_ROW_LIMIT` records. The rest
    /// of the file is not touched.
    pub fn parse(handle: FileHandle) -> Result<Self> {
        let name = handle.name();
        let mut reader = open_reader(&handle)?;
        let headers = read_headers(&mut reader, &name)?;

        let mut sample = Vec::with_capacity(SAMPLE_ROW_LIMIT);
        for record in reader.records().take(SAMPLE_ROW_LIMIT) {
            let record = record?;
            sample.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let schema = infer_schema(&headers, &sample)
            .map_err(|e| TransferError::parse(format!("{}: {}", name, e)))?;
        let rows = sample
            .iter()
            .take(PREVIEW_ROW_LIMIT)
            .map(|record| Row::from_text_cells(&schema, record.iter().map(String::as_str)))
            .collect();
        let preview = RowSet::new(schema.clone(), rows);

        log::info!(
            "Parsed {}: {} columns, {} preview rows",
            name,
            schema.len(),
            preview.len()
        );

        Ok(Self {
            handle,
            schema,
            preview,
        })
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn preview(&self) -> &RowSet {
        &self.preview
    }

    /// Re-reads the file from the start and yields projected batches of at
    /// most `batch_size` rows, so memory stays bounded by one batch.
    pub fn batches(&self, projection: &[String], batch_size: usize) -> Result<CsvBatchReader> {
        if batch_size == 0 {
            return Err(TransferError::validation("batch size must be greater than zero"));
        }
        let projected = self.schema.project(projection)?;

        let mut reader = open_reader(&self.handle)?;
        let headers = read_headers(&mut reader, &self.handle.name())?;
        // Positions come from the file's own header so a reordered file still lines up.
        let indices = projection
            .iter()
            .map(|name| {
                headers.iter().position(|header| header == name).ok_or_else(|| {
                    TransferError::parse(format!(
                        "Column '{}' is no longer present in {}",
                        name,
                        self.handle.name()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CsvBatchReader {
            reader,
            schema: projected,
            indices,
            batch_size,
            total_bytes: self.handle.byte_len()?,
            record: csv::StringRecord::new(),
            finished: false,
        })
    }
}

#[async_trait]
impl SchemaSource for CsvSource {
    fn label(&self) -> String {
        format!("file {}", self.handle.name())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn preview_rows(&self, projection: &[String], join: Option<&JoinSpec>) -> Result<RowSet> {
        reject_join(join)?;
        self.preview.project(projection)
    }

    async fn export_rows(&self, projection: &[String], join: Option<&JoinSpec>) -> Result<String> {
        reject_join(join)?;
        let mut batches = self.batches(projection, crate::data_transfer::engine::TRANSFER_BATCH_SIZE)?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(projection)?;
        while let Some(batch) = batches.next_batch()? {
            for row in &batch.rows {
                writer.write_record(row.values().iter().map(|value| value.to_csv_cell()))?;
            }
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TransferError::Io(std::io::Error::other(e.to_string())))?;
        String::from_utf8(bytes).map_err(|e| TransferError::parse(e.to_string()))
    }
}

fn reject_join(join: Option<&JoinSpec>) -> Result<()> {
    if join.is_some() {
        return Err(TransferError::validation("Joins are only supported for database sources"));
    }
    Ok(())
}

pub struct CsvBatchReader {
    reader: csv::Reader<Box<dyn Read + Send>>,
    schema: Schema,
    indices: Vec<usize>,
    batch_size: usize,
    total_bytes: u64,
    record: csv::StringRecord,
    finished: bool,
}

impl CsvBatchReader {
    /// Projected schema of every batch.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn bytes_read(&self) -> u64 {
        self.reader.position().byte()
    }

    pub fn progress_pct(&self) -> u8 {
        if self.finished || self.total_bytes == 0 {
            return 100;
        }
        let pct = self.bytes_read().saturating_mul(100) / self.total_bytes;
        pct.min(99) as u8
    }

    pub fn next_batch(&mut self) -> Result<Option<RowSet>> {
        if self.finished {
            return Ok(None);
        }

        let mut rows = Vec::with_capacity(self.batch_size);
        while rows.len() < self.batch_size {
            if !self.reader.read_record(&mut self.record)? {
                self.finished = true;
                break;
            }
            let record = &self.record;
            let cells = self.indices.iter().map(|index| record.get(*index).unwrap_or(""));
            rows.push(Row::from_text_cells(&self.schema, cells));
        }

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(RowSet::new(self.schema.clone(), rows)))
    }
}

impl Iterator for CsvBatchReader {
    type Item = Result<RowSet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

#[cfg(test)]
mod tests;
