use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use log::info;
use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::insights::{ExplanationReport, FrequencyReport, PatternInsights};
use crate::mining::Pattern;

use super::summary::{render_explanation, render_frequencies, render_insights};

pub const FAIL_PATTERNS_FILE: &str = "fail_patterns.csv";
pub const SUCCESS_PATTERNS_FILE: &str = "success_patterns.csv";
pub const PRUNED_PATTERNS_FILE: &str = "pruned_patterns.csv";

const PATTERN_HEADER: &str = "Pattern,Support,SupportFraction,Length";

/// Exports mining insights in the requested format.
///
/// - Summary: the rendered terminal report
/// - JSON: the full insights structure
/// - CSV: one row per relevant pattern, with its baseline share when the
///   baseline holds the same pattern
pub fn export_insights(
    insights: &PatternInsights,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_insights(insights))?;
            Ok(())
        }
        OutputFormat::Json => export_json(insights, pretty, output),
        OutputFormat::Csv => export_insights_csv(insights, output),
    }
}

/// Exports a pattern explanation; CSV lists every breakdown count.
pub fn export_explanation(
    report: &ExplanationReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_explanation(report))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Csv => {
            writeln!(output, "Kind,Name,Runs")?;
            write_counts(output, "failed-step", &report.failures)?;
            write_counts(output, "error-category", &report.error_categories)?;
            for (label, values) in &report.labels {
                write_counts(output, label, values)?;
            }
            Ok(())
        }
    }
}

pub fn export_frequencies(
    report: &FrequencyReport,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            writeln!(output, "{}", render_frequencies(report))?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Csv => {
            writeln!(output, "Kind,Name,Runs")?;
            write_counts(output, "failed-step", &report.failures)?;
            write_counts(output, "error-category", &report.error_categories)
        }
    }
}

/// Writes the unpruned, baseline and pruned pattern tables into `dir`.
///
/// # Errors
///
/// Returns an error if the directory or a table cannot be written.
pub fn persist_tables(dir: &Path, insights: &PatternInsights) -> Result<()> {
    fs::create_dir_all(dir)?;

    let baseline = insights
        .baseline
        .as_ref()
        .map_or(&[][..], |population| population.patterns.as_slice());

    write_pattern_file(&dir.join(FAIL_PATTERNS_FILE), &insights.unpruned)?;
    write_pattern_file(&dir.join(SUCCESS_PATTERNS_FILE), baseline)?;
    write_pattern_file(&dir.join(PRUNED_PATTERNS_FILE), &insights.pruned)?;

    info!(
        "Pattern tables written to {} ({} unpruned, {} baseline, {} pruned)",
        dir.display(),
        insights.unpruned.len(),
        baseline.len(),
        insights.pruned.len()
    );
    Ok(())
}

fn write_pattern_file(path: &Path, patterns: &[Pattern]) -> Result<()> {
    let mut file = std::io::BufWriter::new(fs::File::create(path)?);
    writeln!(file, "{PATTERN_HEADER}")?;
    for pattern in patterns {
        writeln!(
            file,
            "\"{}\",{},{},{}",
            pattern.joined(),
            pattern.support,
            pattern.support_fraction,
            pattern.len()
        )?;
    }
    file.flush()?;
    Ok(())
}

fn export_json<T: Serialize + ?Sized>(
    value: &T,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_insights_csv(insights: &PatternInsights, output: &mut dyn Write) -> Result<()> {
    let baseline: HashMap<&[String], f64> = insights
        .baseline
        .iter()
        .flat_map(|population| &population.patterns)
        .map(|p| (p.tokens.as_slice(), p.support_fraction))
        .collect();

    writeln!(output, "{PATTERN_HEADER},BaselineSupportFraction")?;
    for pattern in &insights.pruned {
        let baseline_fraction = baseline
            .get(pattern.tokens.as_slice())
            .map(ToString::to_string)
            .unwrap_or_default();
        writeln!(
            output,
            "\"{}\",{},{},{},{}",
            pattern.joined(),
            pattern.support,
            pattern.support_fraction,
            pattern.len(),
            baseline_fraction
        )?;
    }
    Ok(())
}

fn write_counts(
    output: &mut dyn Write,
    kind: &str,
    counts: &IndexMap<String, usize>,
) -> Result<()> {
    for (name, count) in counts {
        writeln!(output, "\"{kind}\",\"{name}\",{count}")?;
    }
    Ok(())
}
