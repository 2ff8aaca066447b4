use crate::db_types::{JoinCondition, JoinSpec, Schema};
use crate::error::{Result, TransferError};
use serde::Serialize;

/// The combined value handed to the session after every mutation.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChange {
    pub projection: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
}

impl SelectionChange {
    pub fn has_columns(&self) -> bool {
        !self.projection.is_empty()
    }
}

/// User-chosen output columns plus an optional join, for one active source.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    active_table: Option<String>,
    available: Vec<String>,
    projection: Vec<String>,
    join: Option<JoinSpec>,
}

impl Selection {
    /// `active_table` is `None` for file sources, which disables joins.
    pub fn new(schema: &Schema, active_table: Option<&str>) -> Self {
        let mut selection = Self::default();
        selection.reset(schema, active_table);
        selection
    }

    /// Source changed: forget the projection and the join.
    pub fn reset(&mut self, schema: &Schema, active_table: Option<&str>) -> SelectionChange {
        self.active_table = active_table.map(|table| table.trim().to_string());
        self.available = schema.names();
        self.projection.clear();
        self.join = None;
        self.snapshot()
    }

    /// Adds the column at the end, or removes it if already selected.
    pub fn toggle_column(&mut self, name: &str) -> Result<SelectionChange> {
        if !self.available.iter().any(|column| column == name) {
            return Err(TransferError::validation(format!(
                "Column '{}' is not part of the active source",
                name
            )));
        }

        match self.projection.iter().position(|column| column == name) {
            Some(index) => {
                self.projection.remove(index);
            }
            None => self.projection.push(name.to_string()),
        }
        Ok(self.snapshot())
    }

    /// Replaces the projection with `names`, in that order. Unknown or
    /// repeated names reject the whole list and leave the projection as is.
    pub fn set_projection(&mut self, names: &[String]) -> Result<SelectionChange> {
        for (index, name) in names.iter().enumerate() {
            if !self.available.iter().any(|column| column == name) {
                return Err(TransferError::validation(format!(
                    "Column '{}' is not part of the active source",
                    name
                )));
            }
            if names[..index].contains(name) {
                return Err(TransferError::validation(format!(
                    "Column '{}' is listed more than once",
                    name
                )));
            }
        }

        self.projection = names.to_vec();
        Ok(self.snapshot())
    }

    pub fn set_join(&mut self, table: &str, condition: JoinCondition) -> Result<SelectionChange> {
        let Some(active_table) = self.active_table.as_deref() else {
            return Err(TransferError::validation(
                "Joins are only supported for database sources",
            ));
        };

        let table = table.trim();
        if table.is_empty() {
            return Err(TransferError::validation("Join table is required"));
        }
        if table == active_table {
            return Err(TransferError::validation(format!(
                "Cannot join table '{}' with itself",
                table
            )));
        }
        if condition.is_blank() {
            return Err(TransferError::validation("Join condition is required"));
        }

        self.join = Some(JoinSpec {
            target_table: table.to_string(),
            condition,
        });
        Ok(self.snapshot())
    }

    pub fn clear_join(&mut self) -> SelectionChange {
        self.join = None;
        self.snapshot()
    }

    /// Tables that may be joined: everything but the active table. Empty for
    /// file sources.
    pub fn join_candidates(&self, tables: &[String]) -> Vec<String> {
        let Some(active_table) = self.active_table.as_deref() else {
            return Vec::new();
        };
        tables
            .iter()
            .filter(|table| table.as_str() != active_table)
            .cloned()
            .collect()
    }

    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn join(&self) -> Option<&JoinSpec> {
        self.join.as_ref()
    }

    pub fn active_table(&self) -> Option<&str> {
        self.active_table.as_deref()
    }

    pub fn snapshot(&self) -> SelectionChange {
        SelectionChange {
            projection: self.projection.clone(),
            join: self.join.clone(),
        }
    }
}
