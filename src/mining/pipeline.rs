use std::path::PathBuf;

use chrono::Utc;
use log::{info, warn};

use crate::error::{Result, SeqLensError};
use crate::insights::PatternInsights;
use crate::output::{persist_tables, PhaseProgress};
use crate::runs::{RunStore, RunWindow};

use super::anchored::mine_failure_patterns;
use super::baseline::mine_baseline_patterns;
use super::prune::prune;
use super::sequential::MiningLimits;

/// Thresholds and limits shared by every mining pass.
#[derive(Debug, Clone)]
pub struct MiningSettings {
    pub limits: MiningLimits,
    /// Failure support of the first `search` attempt
    pub min_support: f64,
    /// Failure support of the single `search` retry
    pub fallback_min_support: f64,
    pub baseline_support: f64,
    /// Directory receiving persisted pattern tables
    pub output_dir: PathBuf,
    pub show_progress: bool,
}

impl Default for MiningSettings {
    fn default() -> Self {
        Self {
            limits: MiningLimits::default(),
            min_support: 0.15,
            fallback_min_support: 0.1,
            baseline_support: 0.1,
            output_dir: PathBuf::from("."),
            show_progress: false,
        }
    }
}

/// Runs the anchored mining, baseline mining and pruning pipeline over a
/// run store.
pub struct PatternMiner<'a> {
    store: &'a RunStore,
    settings: MiningSettings,
}

impl<'a> PatternMiner<'a> {
    pub fn new(store: &'a RunStore, settings: MiningSettings) -> Self {
        Self { store, settings }
    }

    /// Mines and prunes the failure patterns of runs with
    /// `start_id <= id <= end_id`.
    ///
    /// When `persist` is set, the unpruned, baseline and pruned tables are
    /// written to the configured output directory.
    ///
    /// # Errors
    ///
    /// Returns `EmptyRange` when the window holds no run (nothing is mined or
    /// written), `InsufficientSupport` when no step fails often enough, and
    /// `BaselineTimeout` when baseline mining exceeds the time budget.
    pub async fn mine(
        &self,
        start_id: u64,
        end_id: u64,
        min_support: f64,
        baseline_support: f64,
        persist: bool,
    ) -> Result<PatternInsights> {
        let window = self.store.load(start_id, end_id)?;
        self.mine_window(&window, min_support, baseline_support, persist)
            .await
    }

    /// Mines the whole table, lowering the failure support once when the
    /// first pass yields no relevant pattern.
    ///
    /// The first attempt never writes tables. The retry is persisted whenever
    /// `persist` is set and it produced candidates.
    ///
    /// # Errors
    ///
    /// Returns `EmptyTable` when the store holds no valid run, or any error
    /// of [`PatternMiner::mine`] other than `InsufficientSupport`.
    pub async fn search(&self, persist: bool) -> Result<PatternInsights> {
        let (min_id, max_id) = self.store.id_extent()?;
        let window = self.store.load(min_id, max_id)?;
        let baseline_support = self.settings.baseline_support;

        match self
            .mine_window(&window, self.settings.min_support, baseline_support, false)
            .await
        {
            Ok(insights) if !insights.pruned.is_empty() => return Ok(insights),
            Ok(_) => info!(
                "No relevant pattern at support {}; retrying at {}",
                self.settings.min_support, self.settings.fallback_min_support
            ),
            Err(SeqLensError::InsufficientSupport { required, .. }) => info!(
                "No step fails {required} times at support {}; retrying at {}",
                self.settings.min_support, self.settings.fallback_min_support
            ),
            Err(err) => return Err(err),
        }

        let fallback = self.settings.fallback_min_support;
        let mut insights = match self
            .mine_window(&window, fallback, baseline_support, persist)
            .await
        {
            Ok(insights) => insights,
            Err(SeqLensError::InsufficientSupport { required, failing }) => {
                warn!(
                    "No step fails {required} times among {failing} failing runs; \
                     returning an empty result"
                );
                PatternInsights::empty(
                    &window,
                    self.store.exclusions().total(),
                    fallback,
                    baseline_support,
                )
            }
            Err(err) => return Err(err),
        };
        insights.retried = true;
        Ok(insights)
    }

    async fn mine_window(
        &self,
        window: &RunWindow<'_>,
        min_support: f64,
        baseline_support: f64,
        persist: bool,
    ) -> Result<PatternInsights> {
        let limits = self.settings.limits;
        let failing = window.failing();
        let successful = window.successful();
        info!(
            "Mining {} failing and {} successful runs (builds {} - {})",
            failing.len(),
            successful.len(),
            window.min_id,
            window.max_id
        );

        let progress = PhaseProgress::start_phase_1(self.settings.show_progress, min_support);
        let anchored = match mine_failure_patterns(&failing, min_support, limits).await {
            Ok(anchored) => anchored,
            Err(err) => {
                progress.abandon("Phase 1/3: no failing step reached the threshold");
                return Err(err);
            }
        };

        let mut insights = PatternInsights::empty(
            window,
            self.store.exclusions().total(),
            min_support,
            baseline_support,
        );
        insights.anchors = anchored.anchors;

        if anchored.population.is_empty() {
            progress.abandon("Phase 1/3: no failure pattern found");
            info!("No failure pattern found; skipping baseline mining");
            return Ok(insights);
        }

        let progress = progress.finish_phase_1_start_phase_2(anchored.population.len());
        let baseline = match mine_baseline_patterns(&successful, baseline_support, limits).await
        {
            Ok(baseline) => baseline,
            Err(err) => {
                progress.abandon("Phase 2/3: baseline mining failed");
                return Err(err);
            }
        };

        let progress = progress.finish_phase_2_start_phase_3(baseline.len());
        let (pruned, stats) = prune(&anchored.population.patterns, &baseline.patterns);
        progress.finish_phase_3(pruned.len());

        insights.collected_at = Utc::now();
        insights.unpruned = anchored.population.patterns;
        insights.baseline = Some(baseline);
        insights.pruned = pruned;
        insights.prune_stats = stats;

        if persist {
            persist_tables(&self.settings.output_dir, &insights)?;
        }

        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::PruneStats;
    use crate::runs::{Outcome, Run, RunTable};
    use std::io::Cursor;

    fn run(id: u64, outcome: Outcome, sequence: &str, failed: &[&str]) -> Run {
        Run::new(
            id,
            outcome,
            sequence.split_whitespace().map(ToString::to_string).collect(),
        )
        .with_failed_steps(failed.iter().copied())
    }

    /// Ten failing runs at C (`A B C` in four, `B C` in six) plus twenty
    /// successful runs, one of which contains `B C`.
    fn scenario_store() -> RunStore {
        let mut runs = Vec::new();
        for id in 1..=4 {
            runs.push(run(id, Outcome::Failure, "A B C D", &["C"]));
        }
        for id in 5..=6 {
            runs.push(run(id, Outcome::Failure, "X B C", &["C"]));
        }
        for id in 7..=10 {
            runs.push(run(id, Outcome::Failure, "C B", &["C"]));
        }
        runs.push(run(11, Outcome::Success, "B C", &[]));
        for id in 12..=30 {
            runs.push(run(id, Outcome::Success, "C A", &[]));
        }
        RunStore::new(RunTable::new(runs))
    }

    fn settings(dir: &std::path::Path) -> MiningSettings {
        MiningSettings {
            output_dir: dir.to_path_buf(),
            ..MiningSettings::default()
        }
    }

    #[tokio::test]
    async fn mine_keeps_discriminative_pattern() {
        let store = scenario_store();
        let dir = tempfile::tempdir().unwrap();
        let miner = PatternMiner::new(&store, settings(dir.path()));

        let insights = miner.mine(1, 30, 0.3, 0.1, false).await.unwrap();

        assert_eq!(insights.total_runs, 30);
        assert_eq!(insights.failing_runs, 10);
        assert_eq!(insights.successful_runs, 20);
        let unpruned: Vec<String> = insights.unpruned.iter().map(|p| p.joined()).collect();
        assert!(unpruned.contains(&"B C".to_string()));
        assert!(unpruned.contains(&"A B C".to_string()));

        let pruned: Vec<String> = insights.pruned.iter().map(|p| p.joined()).collect();
        // A B C extends both B C and A C without gaining support
        assert_eq!(pruned, vec!["B C", "A C"]);
        assert_eq!(
            insights.prune_stats,
            PruneStats {
                candidates: 3,
                after_dominance: 3,
                after_minimality: 2,
                after_validity: 2,
            }
        );
        assert!(!dir.path().join("pruned_patterns.csv").exists());
    }

    #[tokio::test]
    async fn mine_persists_three_tables() {
        let store = scenario_store();
        let dir = tempfile::tempdir().unwrap();
        let miner = PatternMiner::new(&store, settings(dir.path()));

        miner.mine(1, 30, 0.3, 0.1, true).await.unwrap();

        let pruned = std::fs::read_to_string(dir.path().join("pruned_patterns.csv")).unwrap();
        assert!(pruned.starts_with("Pattern,Support,SupportFraction,Length"));
        assert!(pruned.contains("\"B C\",6,0.6,2"));
        assert!(dir.path().join("fail_patterns.csv").exists());
        assert!(dir.path().join("success_patterns.csv").exists());
    }

    #[tokio::test]
    async fn empty_range_writes_nothing() {
        let store = scenario_store();
        let dir = tempfile::tempdir().unwrap();
        let miner = PatternMiner::new(&store, settings(dir.path()));

        let err = miner.mine(100, 200, 0.3, 0.1, true).await.unwrap_err();

        assert!(matches!(err, SeqLensError::EmptyRange { min: 100, max: 200 }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn mine_surfaces_insufficient_support() {
        let store = RunStore::new(RunTable::new(vec![
            run(1, Outcome::Failure, "A B", &["A"]),
            run(2, Outcome::Failure, "A B", &["B"]),
        ]));
        let miner = PatternMiner::new(&store, MiningSettings::default());

        let err = miner.mine(1, 2, 1.0, 0.1, false).await.unwrap_err();
        assert!(matches!(
            err,
            SeqLensError::InsufficientSupport {
                required: 2,
                failing: 2
            }
        ));
    }

    #[tokio::test]
    async fn excluded_rows_reach_neither_population() {
        let csv = "\
BUILD_ID,RESULT,SEQUENCE,FAILED,MESSAGE,TIME
1,FAILURE,A B,B,Timeout occurred,
2,FAILURE,A B,B,Timeout occurred,
3,FAILURE,,B,Timeout occurred,
4,SUCCESS,A,,,
";
        let table = RunTable::from_reader(Cursor::new(csv)).unwrap();
        let store = RunStore::new(table);
        let miner = PatternMiner::new(&store, MiningSettings::default());

        let insights = miner.mine(1, 4, 0.5, 0.5, false).await.unwrap();

        assert_eq!(insights.total_runs, 3);
        assert_eq!(insights.failing_runs, 2);
        assert_eq!(insights.excluded_rows, 1);
        assert_eq!(store.exclusions().missing_sequence, vec![3]);
        assert_eq!(insights.unpruned[0].support, 2);
        assert_eq!(insights.baseline.as_ref().unwrap().population_size, 1);
    }

    #[tokio::test]
    async fn search_returns_first_attempt_without_writing() {
        let mut runs = Vec::new();
        for id in 1..=10 {
            runs.push(run(id, Outcome::Failure, "setup deploy", &["deploy"]));
        }
        let store = RunStore::new(RunTable::new(runs));
        let dir = tempfile::tempdir().unwrap();
        let miner = PatternMiner::new(&store, settings(dir.path()));

        let insights = miner.search(true).await.unwrap();

        assert!(!insights.retried);
        assert!((insights.min_support - 0.15).abs() < f64::EPSILON);
        assert_eq!(insights.pruned[0].joined(), "setup deploy");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn search_retries_once_at_lower_support() {
        // Each of ten failing runs fails at its own step: a step needs two
        // failures at 0.15 but only one at 0.1.
        let runs = (1..=10)
            .map(|id| {
                let step = format!("step-{id}");
                run(id, Outcome::Failure, &format!("setup {step}"), &[step.as_str()])
            })
            .collect();
        let store = RunStore::new(RunTable::new(runs));
        let dir = tempfile::tempdir().unwrap();
        let miner = PatternMiner::new(&store, settings(dir.path()));

        let insights = miner.search(true).await.unwrap();

        assert!(insights.retried);
        assert!((insights.min_support - 0.1).abs() < f64::EPSILON);
        assert_eq!(insights.pruned.len(), 10);
        assert!(dir.path().join("fail_patterns.csv").exists());
    }

    #[tokio::test]
    async fn search_returns_empty_result_after_single_retry() {
        // Twenty single failures: two are needed even at 0.1.
        let runs = (1..=20)
            .map(|id| {
                let step = format!("step-{id}");
                run(id, Outcome::Failure, &format!("setup {step}"), &[step.as_str()])
            })
            .collect();
        let store = RunStore::new(RunTable::new(runs));
        let miner = PatternMiner::new(&store, MiningSettings::default());

        let insights = miner.search(false).await.unwrap();

        assert!(insights.retried);
        assert!(insights.pruned.is_empty());
        assert!(insights.anchors.is_empty());
        assert!((insights.min_support - 0.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn search_on_empty_table_fails() {
        let store = RunStore::new(RunTable::new(Vec::new()));
        let miner = PatternMiner::new(&store, MiningSettings::default());

        let err = miner.search(false).await.unwrap_err();
        assert!(matches!(err, SeqLensError::EmptyTable));
    }
}
