mod params;
mod report;

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{info, warn};

use crate::catalog::{sanitize_field, MessageCatalog};
use crate::error::Result;
use crate::runs::{
    BUILD_ID, FAILED, MESSAGE, MESSAGE_SEPARATOR, RESULT, SEQUENCE, TIME, TYPED_COLUMNS,
};

use params::JobParameters;
use report::{collect_steps, read_report, JobSteps};

/// Summary of one ingested CI job.
#[derive(Debug, Clone)]
pub struct IngestedRow {
    pub build_id: u64,
    pub result: String,
    pub steps: usize,
    pub failed: usize,
    /// Whether the run table was created by this call
    pub created: bool,
}

/// Appends one run-table row built from a job's parameter file and test
/// report.
///
/// When the table does not exist it is created with a header whose label
/// columns are `labels`, or the parameter-file keys in file order when
/// `labels` is empty. An existing table's header decides the column order;
/// labels it does not name are dropped.
///
/// # Errors
///
/// Returns an error if an input cannot be read or parsed, or the table
/// cannot be written.
pub fn ingest(
    params_path: &Path,
    report_path: &Path,
    csv_path: &Path,
    catalog: &MessageCatalog,
    labels: &[String],
) -> Result<IngestedRow> {
    let params = JobParameters::from_path(params_path)?;
    let suites = read_report(report_path)?;
    let steps = collect_steps(&suites, catalog);

    if steps.sequence.is_empty() {
        warn!(
            "Report {} holds no executed step; build {} will be excluded from mining",
            report_path.display(),
            params.build_id
        );
    }

    let existing = read_header(csv_path)?;
    let created = existing.is_none();
    let header = existing.unwrap_or_else(|| new_header(&params, labels));

    for key in params.labels.keys() {
        if !header.contains(key) {
            warn!("Parameter {key} has no column in {}; dropping it", csv_path.display());
        }
    }

    let row = build_row(&header, &params, &steps);
    append_row(csv_path, created.then_some(header.as_slice()), &row)?;

    info!(
        "Appended build {} ({}) to {}: {} steps, {} failed",
        params.build_id,
        params.result,
        csv_path.display(),
        steps.sequence.len(),
        steps.failed.len()
    );

    Ok(IngestedRow {
        build_id: params.build_id,
        result: params.result,
        steps: steps.sequence.len(),
        failed: steps.failed.len(),
        created,
    })
}

fn new_header(params: &JobParameters, labels: &[String]) -> Vec<String> {
    let mut header: Vec<String> = if labels.is_empty() {
        params.labels.keys().cloned().collect()
    } else {
        labels.to_vec()
    };
    header.extend(TYPED_COLUMNS.iter().map(ToString::to_string));
    header
}

/// Header of an existing, non-empty table.
fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut first = String::new();
    BufReader::new(fs::File::open(path)?).read_line(&mut first)?;
    let first = first.trim().trim_start_matches('\u{feff}');
    if first.is_empty() {
        return Ok(None);
    }
    Ok(Some(first.split(',').map(|c| c.trim().to_string()).collect()))
}

/// Field values in `header` order.
fn build_row(header: &[String], params: &JobParameters, steps: &JobSteps) -> Vec<String> {
    header
        .iter()
        .map(|column| match column.as_str() {
            BUILD_ID => params.build_id.to_string(),
            RESULT => sanitize_field(&params.result),
            SEQUENCE => steps.sequence.join(" "),
            FAILED => steps.failed.join(" "),
            MESSAGE => steps.error_categories.join(MESSAGE_SEPARATOR),
            TIME => steps
                .start_time
                .as_deref()
                .map(sanitize_field)
                .unwrap_or_default(),
            label => params
                .labels
                .get(label)
                .map(|value| sanitize_field(value))
                .unwrap_or_else(|| {
                    warn!("Parameter file lacks label {label}; leaving it empty");
                    String::new()
                }),
        })
        .collect()
}

fn append_row(path: &Path, header: Option<&[String]>, row: &[String]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    if let Some(header) = header {
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", header.join(","))?;
        }
    } else if !ends_with_newline(&mut file)? {
        writeln!(file)?;
    }

    writeln!(file, "{}", row.join(","))?;
    Ok(())
}

fn ends_with_newline(file: &mut fs::File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
