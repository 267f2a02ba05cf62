use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::mining::{AnchorSummary, Explanation, Pattern, PatternPopulation, PruneStats};
use crate::runs::RunWindow;

/// Result of one mining pass over a build-id window.
#[derive(Debug, Clone, Serialize)]
pub struct PatternInsights {
    pub collected_at: DateTime<Utc>,
    pub min_id: u64,
    pub max_id: u64,
    pub total_runs: usize,
    pub failing_runs: usize,
    pub successful_runs: usize,
    /// Table rows that never became runs (no sequence, malformed, aborted)
    pub excluded_rows: usize,
    pub min_support: f64,
    pub baseline_support: f64,
    /// Whether the search driver had to lower the support threshold
    pub retried: bool,
    pub anchors: Vec<AnchorSummary>,
    pub baseline: Option<PatternPopulation>,
    pub unpruned: Vec<Pattern>,
    pub pruned: Vec<Pattern>,
    pub prune_stats: PruneStats,
}

impl PatternInsights {
    /// Insights for a window that produced no failure pattern.
    pub fn empty(
        window: &RunWindow<'_>,
        excluded_rows: usize,
        min_support: f64,
        baseline_support: f64,
    ) -> Self {
        let failing_runs = window.failing().len();
        Self {
            collected_at: Utc::now(),
            min_id: window.min_id,
            max_id: window.max_id,
            total_runs: window.len(),
            failing_runs,
            successful_runs: window.len() - failing_runs,
            excluded_rows,
            min_support,
            baseline_support,
            retried: false,
            anchors: Vec::new(),
            baseline: None,
            unpruned: Vec::new(),
            pruned: Vec::new(),
            prune_stats: PruneStats::default(),
        }
    }
}

/// Serializable form of an [`Explanation`].
#[derive(Debug, Clone, Serialize)]
pub struct ExplanationReport {
    pub pattern: Vec<String>,
    pub anchor: String,
    pub total_runs: usize,
    pub ordered_runs: usize,
    pub matching_runs: usize,
    pub matching_build_ids: Vec<u64>,
    pub fraction_of_table: f64,
    pub ordered_fraction: f64,
    pub anchor_failure_rate: f64,
    pub failures: IndexMap<String, usize>,
    pub error_categories: IndexMap<String, usize>,
    pub labels: IndexMap<String, IndexMap<String, usize>>,
}

impl From<&Explanation<'_>> for ExplanationReport {
    fn from(explanation: &Explanation<'_>) -> Self {
        Self {
            pattern: explanation.pattern.clone(),
            anchor: explanation.anchor().to_string(),
            total_runs: explanation.total_runs,
            ordered_runs: explanation.ordered_runs,
            matching_runs: explanation.runs.len(),
            matching_build_ids: explanation.runs.iter().map(|run| run.id).collect(),
            fraction_of_table: explanation.fraction_of_table(),
            ordered_fraction: explanation.ordered_fraction(),
            anchor_failure_rate: explanation.anchor_failure_rate(),
            failures: explanation.failures.clone(),
            error_categories: explanation.error_categories.clone(),
            labels: explanation.labels.clone(),
        }
    }
}

/// Failure and error-category frequencies over a window.
#[derive(Debug, Clone, Serialize)]
pub struct FrequencyReport {
    pub min_id: u64,
    pub max_id: u64,
    pub total_runs: usize,
    pub failing_runs: usize,
    pub excluded_rows: usize,
    pub failures: IndexMap<String, usize>,
    pub error_categories: IndexMap<String, usize>,
}
