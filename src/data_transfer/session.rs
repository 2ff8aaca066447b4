use crate::data_transfer::engine;
use crate::data_transfer::models::{
    SessionStatus, TransferDirection, TransferProgress, TransferReport, TransferState,
    TransferTarget,
};
use crate::data_transfer::selection::{Selection, SelectionChange};
use crate::data_transfer::source::Source;
use crate::db_types::{JoinCondition, RowSet};
use crate::error::{ErrorReport, Result, TransferError};
use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

/// One user interaction: a source, what to take from it, and where it goes.
///
/// Methods take `&mut self`, so a session runs one operation at a time.
/// Validation failures are returned without touching the state; failures of
/// the database or the file move the session to `Error`.
pub struct TransferSession {
    id: String,
    direction: TransferDirection,
    source: Option<Source>,
    selection: Selection,
    preview: Option<RowSet>,
    state: TransferState,
    resume_state: Option<TransferState>,
    last_error: Option<ErrorReport>,
    last_report: Option<TransferReport>,
    progress: watch::Sender<TransferProgress>,
}

impl TransferSession {
    pub fn new(direction: TransferDirection) -> Self {
        let (progress, _) = watch::channel(TransferProgress::default());
        Self {
            id: Uuid::new_v4().to_string(),
            direction,
            source: None,
            selection: Selection::default(),
            preview: None,
            state: TransferState::Idle,
            resume_state: None,
            last_error: None,
            last_report: None,
            progress,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// State the session returns to once the failed operation is retried.
    pub fn resume_state(&self) -> Option<TransferState> {
        self.resume_state
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn preview(&self) -> Option<&RowSet> {
        self.preview.as_ref()
    }

    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    pub fn last_report(&self) -> Option<&TransferReport> {
        self.last_report.as_ref()
    }

    pub fn progress(&self) -> TransferProgress {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<TransferProgress> {
        self.progress.subscribe()
    }

    /// Replaces the active source. Projection, join, preview and progress
    /// start over.
    pub fn load_source(&mut self, source: Source) -> Result<SelectionChange> {
        if source.kind() != self.direction.source_kind() {
            return Err(TransferError::validation(format!(
                "A {} transfer cannot read from a {}",
                self.direction.as_str(),
                source.label()
            )));
        }

        let change = self.selection.reset(source.schema(), source.table_name());
        log::info!(
            "Session {} loaded {} ({} columns)",
            self.id,
            source.label(),
            source.schema().len()
        );

        self.source = Some(source);
        self.preview = None;
        self.last_error = None;
        self.resume_state = None;
        self.progress.send_replace(TransferProgress::default());
        self.state = TransferState::SourceLoaded;
        Ok(change)
    }

    pub fn toggle_column(&mut self, name: &str) -> Result<SelectionChange> {
        self.require_source()?;
        let change = self.selection.toggle_column(name)?;
        self.apply_selection(&change);
        Ok(change)
    }

    /// Sets the whole projection at once; see `Selection::set_projection`.
    pub fn select_columns(&mut self, names: &[String]) -> Result<SelectionChange> {
        self.require_source()?;
        let change = self.selection.set_projection(names)?;
        self.apply_selection(&change);
        Ok(change)
    }

    pub fn set_join(&mut self, table: &str, condition: JoinCondition) -> Result<SelectionChange> {
        self.require_source()?;
        let change = self.selection.set_join(table, condition)?;
        self.apply_selection(&change);
        Ok(change)
    }

    pub fn clear_join(&mut self) -> Result<SelectionChange> {
        self.require_source()?;
        let change = self.selection.clear_join();
        self.apply_selection(&change);
        Ok(change)
    }

    /// Tables the active source may be joined with. Empty for files.
    pub async fn join_candidates(&self) -> Result<Vec<String>> {
        match self.require_source()? {
            Source::Database(table) => {
                let tables = table.database().list_tables().await?;
                Ok(self.selection.join_candidates(&tables))
            }
            Source::File(_) => Ok(Vec::new()),
        }
    }

    pub async fn request_preview(&mut self) -> Result<&RowSet> {
        let source = self.require_source()?;
        if self.selection.projection().is_empty() {
            return Err(TransferError::validation("At least one column must be selected"));
        }

        let result = source
            .as_schema_source()
            .preview_rows(self.selection.projection(), self.selection.join())
            .await;

        match result {
            Ok(rows) => {
                log::info!("Session {} preview ready ({} rows)", self.id, rows.len());
                self.last_error = None;
                self.resume_state = None;
                self.state = TransferState::PreviewReady;
                Ok(&*self.preview.insert(rows))
            }
            Err(error) => {
                self.fail(&error, TransferState::SchemaChosen);
                Err(error)
            }
        }
    }

    /// Runs the full transfer once. Progress is published on the watch
    /// channel while it runs.
    pub async fn start_transfer(&mut self, target: TransferTarget) -> Result<&TransferReport> {
        let source = self.require_source()?;
        if self.selection.projection().is_empty() {
            return Err(TransferError::validation("At least one column must be selected"));
        }
        let resume_point = self.transfer_resume_point().ok_or_else(|| {
            TransferError::validation(format!(
                "Cannot start a transfer while the session is {}",
                self.state.as_str()
            ))
        })?;
        if target.direction() != self.direction {
            return Err(TransferError::validation(format!(
                "Target {} does not fit a {} transfer",
                target.describe(),
                self.direction.as_str()
            )));
        }

        let source_label = source.label();
        let projection = self.selection.projection().to_vec();
        let join = self.selection.join().cloned();
        let started_at = Utc::now();

        self.state = TransferState::Transferring;
        self.progress.send_replace(TransferProgress::started());
        log::info!(
            "Session {} transferring {} -> {}",
            self.id,
            source_label,
            target.describe()
        );

        let result = match (self.source.as_ref(), &target) {
            (Some(Source::Database(table)), TransferTarget::File { path }) => {
                engine::export_to_file(table, &projection, join.as_ref(), path, &self.progress).await
            }
            (
                Some(Source::File(file)),
                TransferTarget::Table {
                    database,
                    table,
                    order_by,
                },
            ) => {
                engine::ingest_file(file, &projection, database, table, order_by, &self.progress)
                    .await
            }
            _ => Err(TransferError::validation("Source and target do not match")),
        };

        match result {
            Ok(step) => {
                self.state = TransferState::Done;
                self.last_error = None;
                self.resume_state = None;
                let report = TransferReport {
                    session_id: self.id.clone(),
                    direction: self.direction,
                    source: source_label,
                    destination: step.destination,
                    columns: projection,
                    rows_written: step.written_rows,
                    batches: step.batches,
                    started_at,
                    finished_at: Utc::now(),
                };
                Ok(&*self.last_report.insert(report))
            }
            Err(error) => {
                self.fail(&error, resume_point);
                Err(error)
            }
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            direction: self.direction,
            state: self.state,
            resume_state: self.resume_state,
            source: self.source.as_ref().map(Source::label),
            selection: self.selection.snapshot(),
            preview_rows: self.preview.as_ref().map(RowSet::len).unwrap_or(0),
            progress: self.progress(),
            error: self.last_error.clone(),
        }
    }

    fn require_source(&self) -> Result<&Source> {
        self.source
            .as_ref()
            .ok_or_else(|| TransferError::validation("No source has been loaded"))
    }

    /// Any selection change makes an existing preview stale.
    fn apply_selection(&mut self, change: &SelectionChange) {
        self.preview = None;
        match self.state {
            TransferState::SourceLoaded if !change.has_columns() => {}
            _ => {
                self.state = TransferState::SchemaChosen;
                self.resume_state = None;
                self.last_error = None;
            }
        }
    }

    fn transfer_resume_point(&self) -> Option<TransferState> {
        match self.state {
            TransferState::Error => self.resume_state.filter(TransferState::can_start_transfer),
            state if state.can_start_transfer() => Some(state),
            _ => None,
        }
    }

    fn fail(&mut self, error: &TransferError, resume: TransferState) {
        log::error!("Session {} failed: {}", self.id, error);
        self.state = TransferState::Error;
        self.resume_state = Some(resume);
        self.last_error = Some(error.report());
    }
}
