use std::path::Path;

use log::{debug, info};

use crate::error::{Result, SeqLensError};

use super::table::{Exclusions, RunTable};
use super::types::{Outcome, Run};

/// Valid runs whose build id falls inside an inclusive window.
#[derive(Debug, Clone)]
pub struct RunWindow<'a> {
    pub min_id: u64,
    pub max_id: u64,
    pub runs: Vec<&'a Run>,
}

impl<'a> RunWindow<'a> {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn failing(&self) -> Vec<&'a Run> {
        self.with_outcome(Outcome::Failure)
    }

    pub fn successful(&self) -> Vec<&'a Run> {
        self.with_outcome(Outcome::Success)
    }

    fn with_outcome(&self, outcome: Outcome) -> Vec<&'a Run> {
        self.runs
            .iter()
            .copied()
            .filter(|run| run.outcome == outcome)
            .collect()
    }
}

/// Read-only access to the validated run population.
pub struct RunStore {
    table: RunTable,
}

impl RunStore {
    pub fn new(table: RunTable) -> Self {
        Self { table }
    }

    /// Opens the run table at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        RunTable::from_path(path).map(Self::new)
    }

    pub fn exclusions(&self) -> &Exclusions {
        self.table.exclusions()
    }

    /// Full extent of available build ids.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTable` when no valid run exists.
    pub fn id_extent(&self) -> Result<(u64, u64)> {
        self.table.id_extent().ok_or(SeqLensError::EmptyTable)
    }

    /// Returns all valid runs with `min_id <= id <= max_id`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRange` when the window holds no run; callers must not
    /// mine an empty window.
    pub fn load(&self, min_id: u64, max_id: u64) -> Result<RunWindow<'_>> {
        let runs: Vec<&Run> = self
            .table
            .runs()
            .iter()
            .filter(|run| (min_id..=max_id).contains(&run.id))
            .collect();

        if runs.is_empty() {
            return Err(SeqLensError::EmptyRange {
                min: min_id,
                max: max_id,
            });
        }

        info!(
            "Selected {} runs with build id between {min_id} and {max_id}",
            runs.len()
        );
        debug!(
            "{} rows were excluded from the table before windowing",
            self.exclusions().total()
        );

        Ok(RunWindow {
            min_id,
            max_id,
            runs,
        })
    }
}
