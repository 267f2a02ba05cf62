use std::collections::{BTreeMap, HashMap, HashSet};

use log::info;
use serde::Serialize;

use super::pattern::{support_order, Pattern};

/// Pattern counts after each pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneStats {
    pub candidates: usize,
    pub after_dominance: usize,
    pub after_minimality: usize,
    pub after_validity: usize,
}

/// Filters failure patterns down to the discriminative, minimal ones.
///
/// Runs the dominance, minimality and validity passes in that order and
/// returns the survivors sorted by support descending. Patterns are only ever
/// removed, never edited, and re-pruning the output changes nothing.
pub fn prune(failure: &[Pattern], baseline: &[Pattern]) -> (Vec<Pattern>, PruneStats) {
    let mut stats = PruneStats {
        candidates: failure.len(),
        ..PruneStats::default()
    };
    info!("Failed patterns length: {}", stats.candidates);

    let survivors = drop_dominated(failure.to_vec(), baseline);
    stats.after_dominance = survivors.len();
    info!(
        "Failed patterns length after eliminating patterns that have more support in success cases: {}",
        stats.after_dominance
    );

    let survivors = drop_weak_extensions(survivors);
    stats.after_minimality = survivors.len();
    info!(
        "Failed patterns length after eliminating weak extensions: {}",
        stats.after_minimality
    );

    let mut survivors = drop_repeated_tokens(survivors);
    stats.after_validity = survivors.len();

    survivors.sort_by(support_order);
    (survivors, stats)
}

/// Drops patterns whose identical baseline pattern has a strictly higher
/// support fraction. Patterns absent from the baseline are kept.
fn drop_dominated(patterns: Vec<Pattern>, baseline: &[Pattern]) -> Vec<Pattern> {
    let baseline_fractions: HashMap<&[String], f64> = baseline
        .iter()
        .map(|p| (p.tokens.as_slice(), p.support_fraction))
        .collect();

    patterns
        .into_iter()
        .filter(|pattern| {
            baseline_fractions
                .get(pattern.tokens.as_slice())
                .is_none_or(|&baseline| baseline <= pattern.support_fraction)
        })
        .collect()
}

/// Drops every length `k + 1` pattern that contains some length `k` pattern
/// in order without exceeding its support.
///
/// All pairs are judged against the input set before anything is removed, so
/// the outcome does not depend on input order.
fn drop_weak_extensions(patterns: Vec<Pattern>) -> Vec<Pattern> {
    let mut by_length: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, pattern) in patterns.iter().enumerate() {
        by_length.entry(pattern.len()).or_default().push(index);
    }

    let mut weak: HashSet<usize> = HashSet::new();
    for (length, shorter) in &by_length {
        let Some(longer) = by_length.get(&(length + 1)) else {
            continue;
        };

        for &q in longer {
            let extension = &patterns[q];
            let is_weak = shorter.iter().any(|&p| {
                let base = &patterns[p];
                extension.support <= base.support && base.is_ordered_subset_of(extension)
            });
            if is_weak {
                weak.insert(q);
            }
        }
    }

    patterns
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !weak.contains(index))
        .map(|(_, pattern)| pattern)
        .collect()
}

fn drop_repeated_tokens(patterns: Vec<Pattern>) -> Vec<Pattern> {
    patterns
        .into_iter()
        .filter(|pattern| !pattern.has_repeated_token())
        .collect()
}
