use log::{info, warn};

use crate::error::{Result, SeqLensError};
use crate::runs::Run;

use super::pattern::{min_count, support_order, Pattern, PatternPopulation, Source};
use super::sequential::{mine_blocking, MiningLimits};

/// Mines the "normal behaviour" patterns of successful runs.
///
/// Full executed-step sequences are mined with minimum count
/// `round(baseline_support * |successful|)`; no anchor constraint applies.
///
/// # Errors
///
/// Returns `BaselineTimeout` when mining exceeds the time budget, or an error
/// if the mining task panics.
pub async fn mine_baseline_patterns(
    successful: &[&Run],
    baseline_support: f64,
    limits: MiningLimits,
) -> Result<PatternPopulation> {
    let population_size = successful.len();
    let required = min_count(baseline_support, population_size);

    let mut population = PatternPopulation {
        source: Source::Baseline,
        threshold: baseline_support,
        min_count: required,
        population_size,
        patterns: Vec::new(),
    };

    if successful.is_empty() {
        warn!("No successful runs in range; baseline is empty");
        return Ok(population);
    }

    let sequences = successful.iter().map(|run| run.steps.clone()).collect();
    let found = mine_blocking(sequences, required, limits)
        .await?
        .ok_or(SeqLensError::BaselineTimeout(limits.timeout))?;

    population.patterns = found
        .into_iter()
        .map(|candidate| Pattern::new(candidate.items, candidate.count, population_size))
        .collect();
    population.patterns.sort_by(support_order);

    info!(
        "Number of patterns in successful cases with support {baseline_support} => {}",
        population.len()
    );

    Ok(population)
}
