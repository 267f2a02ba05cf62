use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Final result of a CI execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Failure => f.write_str("FAILURE"),
        }
    }
}

/// One CI test execution.
///
/// Built once from a feature-table row and never mutated afterwards. The
/// executed steps are kept both in order (`steps`) and as a step to 1-based
/// position lookup (`sequence_positions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Build identifier (`BUILD_ID`)
    pub id: u64,
    pub outcome: Outcome,
    /// Executed step names in execution order
    pub steps: Vec<String>,
    /// Step name to 1-based position of its first execution
    pub sequence_positions: HashMap<String, usize>,
    pub failed_steps: BTreeSet<String>,
    pub error_categories: BTreeSet<String>,
    /// Environment labels (versions, platform) in table column order
    pub labels: IndexMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(id: u64, outcome: Outcome, steps: Vec<String>) -> Self {
        let mut sequence_positions = HashMap::new();
        for (index, step) in steps.iter().enumerate() {
            sequence_positions.entry(step.clone()).or_insert(index + 1);
        }

        Self {
            id,
            outcome,
            steps,
            sequence_positions,
            failed_steps: BTreeSet::new(),
            error_categories: BTreeSet::new(),
            labels: IndexMap::new(),
            started_at: None,
        }
    }

    #[must_use]
    pub fn with_failed_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failed_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_error_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.error_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn position(&self, step: &str) -> Option<usize> {
        self.sequence_positions.get(step).copied()
    }

    pub fn failed_at(&self, step: &str) -> bool {
        self.failed_steps.contains(step)
    }

    /// Executed steps up to and including the first execution of `step`.
    ///
    /// Returns `None` when `step` never ran.
    pub fn prefix_through(&self, step: &str) -> Option<&[String]> {
        self.position(step).map(|position| &self.steps[..position])
    }
}
