use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::catalog::{sanitize_field, MessageCatalog};
use crate::error::{Result, SeqLensError};

const SKIPPED: &str = "skipped";
const FAILED: &str = "failed";

/// One suite of a Ginkgo JSON report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SuiteReport {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub spec_reports: Vec<SpecReport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpecReport {
    #[serde(default)]
    pub container_hierarchy_texts: Option<Vec<String>>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub failure: Option<SpecFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpecFailure {
    #[serde(default)]
    pub message: String,
}

impl SpecReport {
    /// Test step name: the second container text, as one
    /// whitespace-free token.
    fn step(&self) -> Option<String> {
        self.container_hierarchy_texts
            .as_ref()
            .and_then(|texts| texts.get(1))
            .map(|text| {
                sanitize_field(text)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join("_")
            })
            .filter(|step| !step.is_empty())
    }
}

/// Steps and failures of one CI job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSteps {
    /// Executed steps in report order, skipped ones excluded
    pub sequence: Vec<String>,
    pub failed: Vec<String>,
    /// Error categories, de-duplicated in first-seen order
    pub error_categories: Vec<String>,
    pub start_time: Option<String>,
}

/// Reads a Ginkgo JSON report.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or `Report` if it is not a
/// non-empty array of suites.
pub fn read_report(path: &Path) -> Result<Vec<SuiteReport>> {
    let contents = fs::read_to_string(path)?;
    parse_report(&contents)
}

/// # Errors
///
/// Returns `Report` if `contents` is not a non-empty array of suites.
pub fn parse_report(contents: &str) -> Result<Vec<SuiteReport>> {
    let suites: Vec<SuiteReport> =
        serde_json::from_str(contents).map_err(|err| SeqLensError::Report(err.to_string()))?;
    if suites.is_empty() {
        return Err(SeqLensError::Report("report contains no suite".into()));
    }
    Ok(suites)
}

/// Collects the step sequence of the first suite.
///
/// Entries without a step name are ignored. Every non-skipped step joins the
/// sequence; failed steps are also recorded with their categorized message.
pub fn collect_steps(suites: &[SuiteReport], catalog: &MessageCatalog) -> JobSteps {
    let Some(suite) = suites.first() else {
        return JobSteps::default();
    };

    let mut steps = JobSteps {
        start_time: suite.start_time.clone(),
        ..JobSteps::default()
    };

    for spec in &suite.spec_reports {
        let Some(step) = spec.step() else {
            continue;
        };

        if spec.state == SKIPPED {
            continue;
        }

        steps.sequence.push(step.clone());
        if spec.state == FAILED {
            steps.failed.push(step);
            let message = spec.failure.as_ref().map_or("", |f| f.message.as_str());
            let category = catalog.categorize(message);
            if !category.is_empty() && !steps.error_categories.contains(&category) {
                steps.error_categories.push(category);
            }
        }
    }

    steps
}
