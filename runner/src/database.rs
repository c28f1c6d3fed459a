pub mod sqlite;

use crate::{experiment::Param, task::Task};
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;
use tracing::{debug, info};

/// file name of the result table inside an output directory
pub const RESULTS_FILE: &str = "results.sqlite";

/// column holding the instance name
pub const INSTANCE_COLUMN: &str = "instance";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("SQLite error: {0}")]
    SQLite(#[from] rusqlite::Error),
}

/// one row of the result table, NULL columns are absent
pub type Row = BTreeMap<String, Param>;

/// Read-only snapshot of previously recorded results
#[derive(Debug, Clone, Default)]
pub struct PriorTable {
    rows: Vec<Row>,
    key_fields: Vec<String>,
}

impl PriorTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            key_fields: Vec::new(),
        }
    }

    /// select the configuration fields compared next to the instance name
    pub fn keyed_by(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// whether a row matches the task on the instance and every key field
    pub fn contains(&self, task: &Task) -> bool {
        self.rows.iter().any(|row| {
            matches!(
                row.get(INSTANCE_COLUMN),
                Some(Param::Text(name)) if *name == task.instance.name
            )
                && self.key_fields.iter().all(|field| {
                    match (row.get(field), task.configuration.get(field)) {
                        (Some(recorded), Some(wanted)) => recorded == wanted,
                        _ => false,
                    }
                })
        })
    }
}

/// snapshot the result table of `directory`, missing directories or tables are empty
pub fn load_prior_results(directory: &Path) -> Result<PriorTable, TableError> {
    let path = directory.join(RESULTS_FILE);

    if !path.is_file() {
        debug!(path = ?path, "No result table present, starting from an empty table");
        return Ok(PriorTable::empty());
    }

    let rows = match sqlite::ResultTable::open_read_only(&path)? {
        Some(table) => table.rows()?,
        None => Vec::new(),
    };

    info!(path = ?path, rows = rows.len(), "Loaded prior results");

    Ok(PriorTable::from_rows(rows))
}
