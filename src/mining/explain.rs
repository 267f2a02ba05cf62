use indexmap::IndexMap;
use log::info;

use crate::counters::{count_error_categories, count_failures, count_labels};
use crate::error::{Result, SeqLensError};
use crate::runs::Run;

/// Runs exhibiting one pattern, with descriptive statistics.
#[derive(Debug, Clone)]
pub struct Explanation<'a> {
    pub pattern: Vec<String>,
    pub total_runs: usize,
    /// Runs executing every consecutive token pair in order
    pub ordered_runs: usize,
    /// Ordered runs that also failed at the anchor
    pub runs: Vec<&'a Run>,
    pub failures: IndexMap<String, usize>,
    pub error_categories: IndexMap<String, usize>,
    pub labels: IndexMap<String, IndexMap<String, usize>>,
}

impl Explanation<'_> {
    pub fn anchor(&self) -> &str {
        self.pattern.last().map_or("", String::as_str)
    }

    /// Share of the whole table the final subset represents.
    pub fn fraction_of_table(&self) -> f64 {
        ratio(self.runs.len(), self.total_runs)
    }

    /// Share of the whole table exhibiting the ordering.
    pub fn ordered_fraction(&self) -> f64 {
        ratio(self.ordered_runs, self.total_runs)
    }

    /// How often the anchor failed when the ordering was observed.
    pub fn anchor_failure_rate(&self) -> f64 {
        ratio(self.runs.len(), self.ordered_runs)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(count: usize, total: usize) -> f64 {
    if total > 0 {
        count as f64 / total as f64
    } else {
        0.0
    }
}

/// Slices `runs` down to those exhibiting `pattern` and failing at its anchor.
///
/// Each consecutive token pair `(a, b)` restricts the output of the previous
/// restriction to runs where both ran and `a` ran first. The anchor (last
/// token) restriction is applied last.
///
/// # Errors
///
/// Returns `InvalidPattern` for an empty pattern.
pub fn explain<'a, S: AsRef<str>>(pattern: &[S], runs: &'a [Run]) -> Result<Explanation<'a>> {
    let pattern: Vec<String> = pattern.iter().map(|t| t.as_ref().to_string()).collect();
    let Some(anchor) = pattern.last() else {
        return Err(SeqLensError::InvalidPattern("pattern has no steps".into()));
    };

    let mut sliced: Vec<&Run> = runs.iter().collect();
    for pair in pattern.windows(2) {
        let (first, second) = (pair[0].as_str(), pair[1].as_str());
        sliced.retain(|run| match (run.position(first), run.position(second)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        });
    }
    let ordered_runs = sliced.len();

    sliced.retain(|run| run.failed_at(anchor));

    let explanation = Explanation {
        total_runs: runs.len(),
        ordered_runs,
        failures: count_failures(&sliced),
        error_categories: count_error_categories(&sliced),
        labels: count_labels(&sliced),
        runs: sliced,
        pattern,
    };

    info!(
        "Pattern {} observed in {} of {} runs; anchor failed in {} of them",
        explanation.pattern.join(" ==> "),
        explanation.ordered_runs,
        explanation.total_runs,
        explanation.runs.len()
    );

    Ok(explanation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::Outcome;

    fn run(id: u64, outcome: Outcome, sequence: &str, failed: &[&str]) -> Run {
        Run::new(
            id,
            outcome,
            sequence.split_whitespace().map(ToString::to_string).collect(),
        )
        .with_failed_steps(failed.iter().copied())
    }

    fn table() -> Vec<Run> {
        vec![
            run(1, Outcome::Failure, "A B C", &["C"])
                .with_error_categories(["Timeout occurred"])
                .with_label("IP_FAMILY", "ipv4"),
            run(2, Outcome::Failure, "A X B C", &["C", "X"])
                .with_error_categories(["Timeout occurred", "TLS handshake timeout"])
                .with_label("IP_FAMILY", "dualstack"),
            run(3, Outcome::Success, "A B C", &[]),
            run(4, Outcome::Failure, "B A C", &["C"]),
            run(5, Outcome::Failure, "A B", &["B"]),
        ]
    }

    #[test]
    fn chains_pairwise_order_restrictions() {
        let runs = table();
        let explanation = explain(&["A", "B", "C"], &runs).unwrap();

        assert_eq!(explanation.total_runs, 5);
        assert_eq!(explanation.ordered_runs, 3);
        let ids: Vec<u64> = explanation.runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!((explanation.fraction_of_table() - 0.4).abs() < 1e-9);
        assert!((explanation.ordered_fraction() - 0.6).abs() < 1e-9);
        assert!((explanation.anchor_failure_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn breaks_down_failures_and_categories_within_subset() {
        let runs = table();
        let explanation = explain(&["A", "B", "C"], &runs).unwrap();

        assert_eq!(explanation.failures["C"], 2);
        assert_eq!(explanation.failures["X"], 1);
        assert_eq!(explanation.error_categories["Timeout occurred"], 2);
        assert_eq!(explanation.labels["IP_FAMILY"]["ipv4"], 1);
        assert_eq!(explanation.anchor(), "C");
    }

    #[test]
    fn single_step_pattern_only_applies_anchor() {
        let runs = table();
        let explanation = explain(&["B"], &runs).unwrap();
        assert_eq!(explanation.ordered_runs, 5);
        assert_eq!(explanation.runs.len(), 1);
        assert_eq!(explanation.runs[0].id, 5);
    }

    #[test]
    fn unmatched_pattern_gives_empty_subset() {
        let runs = table();
        let explanation = explain(&["C", "A"], &runs).unwrap();
        assert_eq!(explanation.ordered_runs, 0);
        assert!(explanation.runs.is_empty());
        assert_eq!(explanation.anchor_failure_rate(), 0.0);
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let runs = table();
        let empty: [&str; 0] = [];
        assert!(matches!(
            explain(&empty, &runs),
            Err(SeqLensError::InvalidPattern(_))
        ));
    }

    #[test]
    fn empty_table_gives_zero_fractions() {
        let explanation = explain(&["A", "B"], &[]).unwrap();
        assert_eq!(explanation.total_runs, 0);
        assert_eq!(explanation.fraction_of_table(), 0.0);
    }
}
