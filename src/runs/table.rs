use std::fs;
use std::io::BufRead;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{Result, SeqLensError};

use super::types::{Outcome, Run};

pub const BUILD_ID: &str = "BUILD_ID";
pub const RESULT: &str = "RESULT";
pub const SEQUENCE: &str = "SEQUENCE";
pub const FAILED: &str = "FAILED";
pub const MESSAGE: &str = "MESSAGE";
pub const TIME: &str = "TIME";

/// Separator between error categories inside the `MESSAGE` column.
pub const MESSAGE_SEPARATOR: &str = "***";

pub const TYPED_COLUMNS: [&str; 6] = [BUILD_ID, RESULT, SEQUENCE, FAILED, MESSAGE, TIME];

/// Rows that did not become runs, kept for auditing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Exclusions {
    /// Build ids of rows without a recorded sequence
    pub missing_sequence: Vec<u64>,
    /// Rows whose result was `ABORTED`
    pub aborted: usize,
    /// Rows with wrong arity, a bad build id or an unknown result
    pub malformed: usize,
}

impl Exclusions {
    /// Rows excluded for reasons other than being aborted.
    pub fn invalid(&self) -> usize {
        self.missing_sequence.len() + self.malformed
    }

    pub fn total(&self) -> usize {
        self.invalid() + self.aborted
    }
}

/// Typed run records built from the per-run CSV table.
#[derive(Debug, Clone, Default)]
pub struct RunTable {
    runs: Vec<Run>,
    exclusions: Exclusions,
}

struct Columns {
    build_id: usize,
    result: usize,
    sequence: usize,
    failed: Option<usize>,
    message: Option<usize>,
    time: Option<usize>,
    labels: Vec<(usize, String)>,
    width: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|column| *column == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| SeqLensError::RunTable(format!("missing column {name}")))
        };

        let labels = names
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && !TYPED_COLUMNS.contains(name))
            .map(|(index, name)| (index, (*name).to_string()))
            .collect();

        Ok(Self {
            build_id: require(BUILD_ID)?,
            result: require(RESULT)?,
            sequence: require(SEQUENCE)?,
            failed: find(FAILED),
            message: find(MESSAGE),
            time: find(TIME),
            labels,
            width: names.len(),
        })
    }
}

enum RowOutcome {
    Run(Run),
    MissingSequence(u64),
    Aborted,
    Malformed(String),
}

impl RunTable {
    pub fn new(runs: Vec<Run>) -> Self {
        Self {
            runs,
            exclusions: Exclusions::default(),
        }
    }

    /// Reads the run table from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its header lacks a
    /// required column.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let table = Self::from_reader(std::io::BufReader::new(file))?;
        info!(
            "Loaded {} runs from {} ({} rows excluded)",
            table.runs.len(),
            path.display(),
            table.exclusions.total()
        );
        Ok(table)
    }

    /// Parses a comma-delimited run table.
    ///
    /// Fields never contain commas or line breaks; ingestion replaces them.
    ///
    /// # Errors
    ///
    /// Returns an error on read failure, an empty input, or a header that
    /// lacks `BUILD_ID`, `RESULT` or `SEQUENCE`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .transpose()?
            .ok_or_else(|| SeqLensError::RunTable("missing header row".into()))?;
        let columns = Columns::from_header(header.trim_start_matches('\u{feff}'))?;

        let mut table = Self::default();
        for (line_number, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_row(&columns, &line) {
                RowOutcome::Run(run) => table.runs.push(run),
                RowOutcome::MissingSequence(id) => {
                    debug!("Excluding build {id}: no recorded sequence");
                    table.exclusions.missing_sequence.push(id);
                }
                RowOutcome::Aborted => table.exclusions.aborted += 1,
                RowOutcome::Malformed(reason) => {
                    warn!("Excluding row {}: {reason}", line_number + 2);
                    table.exclusions.malformed += 1;
                }
            }
        }

        Ok(table)
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    /// Lowest and highest build id among valid runs.
    pub fn id_extent(&self) -> Option<(u64, u64)> {
        let min = self.runs.iter().map(|run| run.id).min()?;
        let max = self.runs.iter().map(|run| run.id).max()?;
        Some((min, max))
    }
}

fn parse_row(columns: &Columns, line: &str) -> RowOutcome {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != columns.width {
        return RowOutcome::Malformed(format!(
            "expected {} fields, found {}",
            columns.width,
            fields.len()
        ));
    }

    let Ok(id) = fields[columns.build_id].parse::<u64>() else {
        return RowOutcome::Malformed(format!(
            "invalid build id '{}'",
            fields[columns.build_id]
        ));
    };

    let outcome = match fields[columns.result] {
        "SUCCESS" => Outcome::Success,
        "FAILURE" => Outcome::Failure,
        "ABORTED" => return RowOutcome::Aborted,
        other => return RowOutcome::Malformed(format!("unknown result '{other}'")),
    };

    let steps = split_words(fields[columns.sequence]);
    if steps.is_empty() {
        return RowOutcome::MissingSequence(id);
    }

    let field = |index: Option<usize>| index.map_or("", |i| fields[i]);

    let mut run = Run::new(id, outcome, steps)
        .with_failed_steps(split_words(field(columns.failed)))
        .with_error_categories(
            field(columns.message)
                .split(MESSAGE_SEPARATOR)
                .map(str::trim)
                .filter(|category| !category.is_empty()),
        );

    for (index, name) in &columns.labels {
        run = run.with_label(name.as_str(), fields[*index]);
    }
    run.started_at = parse_time(field(columns.time));

    RowOutcome::Run(run)
}

fn split_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(ToString::to_string).collect()
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}
