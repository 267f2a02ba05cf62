use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;

use crate::counters::count_failures;
use crate::error::{Result, SeqLensError};
use crate::runs::Run;

use super::pattern::{min_count, support_order, Pattern, PatternPopulation, Source};
use super::sequential::{mine_blocking, FrequentSequence, MiningLimits};

/// Mining outcome for one failing step.
#[derive(Debug, Clone, Serialize)]
pub struct AnchorSummary {
    pub step: String,
    /// Failing runs in which the step failed
    pub failures: usize,
    /// Patterns kept for this anchor
    pub patterns: usize,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct AnchoredMining {
    pub population: PatternPopulation,
    pub anchors: Vec<AnchorSummary>,
}

/// Mines failure patterns anchored to each frequently failing step.
///
/// For every step failing in at least `round(min_support * |failing|)` runs,
/// the runs failing at it are truncated just after its first execution and
/// mined together. Only candidates of length two or more that end with the
/// anchor are kept. Anchors are mined concurrently and merged in anchor order.
///
/// # Errors
///
/// Returns `InsufficientSupport` when no step fails often enough, or an error
/// if a mining task panics. An anchor that times out is skipped.
pub async fn mine_failure_patterns(
    failing: &[&Run],
    min_support: f64,
    limits: MiningLimits,
) -> Result<AnchoredMining> {
    let population_size = failing.len();
    let required = min_count(min_support, population_size);

    let failure_counts = count_failures(failing);
    info!("Failing steps over {population_size} failing runs: {failure_counts:?}");
    info!("Required fail number: {required}");

    let anchors: Vec<(String, usize)> = failure_counts
        .into_iter()
        .filter(|(_, count)| *count >= required)
        .collect();

    if anchors.is_empty() {
        return Err(SeqLensError::InsufficientSupport {
            required,
            failing: population_size,
        });
    }

    let tasks = anchors.iter().map(|(step, _)| {
        let sequences = anchored_sequences(failing, step);
        mine_blocking(sequences, required, limits)
    });
    let results = join_all(tasks).await;

    let mut patterns = Vec::new();
    let mut summaries = Vec::with_capacity(anchors.len());

    for ((step, failures), result) in anchors.into_iter().zip(results) {
        let Some(found) = result? else {
            warn!(
                "Mining for failing step '{step}' exceeded {:?}; skipping it",
                limits.timeout
            );
            summaries.push(AnchorSummary {
                step,
                failures,
                patterns: 0,
                timed_out: true,
            });
            continue;
        };

        let kept = keep_anchored(found, &step, population_size);
        debug!("{} patterns end with failing step '{step}'", kept.len());

        summaries.push(AnchorSummary {
            step,
            failures,
            patterns: kept.len(),
            timed_out: false,
        });
        patterns.extend(kept);
    }

    patterns.sort_by(support_order);
    info!(
        "Number of patterns in failed cases with support {min_support} => {}",
        patterns.len()
    );

    Ok(AnchoredMining {
        population: PatternPopulation {
            source: Source::Failure,
            threshold: min_support,
            min_count: required,
            population_size,
            patterns,
        },
        anchors: summaries,
    })
}

/// Executed-step prefixes, through `anchor`, of the runs that failed at it.
fn anchored_sequences(failing: &[&Run], anchor: &str) -> Vec<Vec<String>> {
    failing
        .iter()
        .filter(|run| run.failed_at(anchor))
        .filter_map(|run| {
            let prefix = run.prefix_through(anchor);
            if prefix.is_none() {
                debug!("Build {} failed at '{anchor}' without executing it", run.id);
            }
            prefix.map(<[String]>::to_vec)
        })
        .collect()
}

fn keep_anchored(found: Vec<FrequentSequence>, anchor: &str, population_size: usize) -> Vec<Pattern> {
    found
        .into_iter()
        .map(|candidate| Pattern::new(candidate.items, candidate.count, population_size))
        .filter(|pattern| pattern.len() >= 2 && pattern.anchor() == Some(anchor))
        .collect()
}
