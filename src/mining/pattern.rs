use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Population a pattern set was mined from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Failure,
    Baseline,
}

/// An ordered sequence of step names with its support in one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub tokens: Vec<String>,
    /// Number of runs containing the tokens in order
    pub support: usize,
    /// `support` divided by the population size
    pub support_fraction: f64,
}

impl Pattern {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(tokens: Vec<String>, support: usize, population_size: usize) -> Self {
        let support_fraction = if population_size > 0 {
            support as f64 / population_size as f64
        } else {
            0.0
        };

        Self {
            tokens,
            support,
            support_fraction,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The failing step a failure pattern explains.
    pub fn anchor(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    pub fn has_repeated_token(&self) -> bool {
        let mut seen = HashSet::new();
        !self.tokens.iter().all(|token| seen.insert(token.as_str()))
    }

    /// Whether every token of `self` occurs in `other` with the order kept.
    ///
    /// Tokens are located at their first occurrence in `other`; the located
    /// positions must be strictly increasing.
    pub fn is_ordered_subset_of(&self, other: &Pattern) -> bool {
        let mut previous: Option<usize> = None;
        for token in &self.tokens {
            let Some(position) = other.tokens.iter().position(|t| t == token) else {
                return false;
            };
            if previous.is_some_and(|p| position <= p) {
                return false;
            }
            previous = Some(position);
        }
        true
    }

    /// Space-separated form used in tables and on the command line.
    pub fn joined(&self) -> String {
        self.tokens.join(" ")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" ==> "))
    }
}

/// Support descending, then shorter first, then by tokens.
pub fn support_order(a: &Pattern, b: &Pattern) -> Ordering {
    b.support
        .cmp(&a.support)
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.tokens.cmp(&b.tokens))
}

/// Patterns produced by one mining pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternPopulation {
    pub source: Source,
    /// Fractional threshold the pass was run with
    pub threshold: f64,
    /// `round(threshold * population_size)`
    pub min_count: usize,
    pub population_size: usize,
    pub patterns: Vec<Pattern>,
}

impl PatternPopulation {
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Minimum run count for a fractional threshold, rounding halves up.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn min_count(threshold: f64, population_size: usize) -> usize {
    let raw = threshold * population_size as f64;
    // snap float noise first: 0.15 * 10 evaluates just below 1.5
    let rounded = (raw * 1e9).round() / 1e9;
    (rounded + 0.5).floor().max(0.0) as usize
}
