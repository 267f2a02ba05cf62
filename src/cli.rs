use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::catalog::MessageCatalog;
use crate::config::{check_support, Config, OutputFormat};
use crate::counters::{count_error_categories, count_failures};
use crate::ingest::ingest;
use crate::insights::{ExplanationReport, FrequencyReport};
use crate::mining::{explain, MiningSettings, PatternMiner};
use crate::output::{dim, export_explanation, export_frequencies, export_insights};
use crate::runs::{Run, RunStore, RunWindow};

#[derive(Parser)]
#[command(name = "seqlens")]
#[command(author, version, about = "CI Failure Sequence Analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./seqlens.toml and friends)
    #[arg(short, long, global = true, env = "SEQLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Run table to read (overrides data.runs-file)
    #[arg(short, long, global = true)]
    runs: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Hide progress spinners
    #[arg(short, long, global = true, default_value_t = false)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one CI job to the run table
    Ingest {
        /// KEY=VALUE parameter file of the job
        #[arg(long)]
        params: PathBuf,

        /// Ginkgo JSON report of the job
        #[arg(long)]
        report: PathBuf,

        /// Run table to append to (defaults to the configured runs file)
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Mine failure patterns over a build-id window
    Mine {
        #[arg(short, long)]
        start: u64,

        #[arg(short, long)]
        end: u64,

        #[arg(long)]
        min_support: Option<f64>,

        #[arg(long)]
        baseline_support: Option<f64>,

        /// Persist the pattern tables as CSV
        #[arg(short, long, default_value_t = false)]
        write: bool,
    },

    /// Mine the whole table, lowering the support once if nothing is found
    Search {
        #[arg(short, long, default_value_t = false)]
        write: bool,
    },

    /// Show the runs exhibiting a pattern
    Explain {
        /// Steps in order, e.g. "deploy scale-out traffic"
        #[arg(long)]
        pattern: String,

        #[arg(short, long)]
        start: Option<u64>,

        #[arg(short, long)]
        end: Option<u64>,
    },

    /// Count failed steps and error categories
    Counts {
        #[arg(short, long)]
        start: Option<u64>,

        #[arg(short, long)]
        end: Option<u64>,
    },
}

impl Cli {
    fn runs_path(&self, config: &Config) -> PathBuf {
        self.runs
            .clone()
            .unwrap_or_else(|| config.data.runs_file.clone())
    }

    fn open_store(&self, config: &Config) -> Result<RunStore> {
        let path = self.runs_path(config);
        RunStore::open(&path)
            .with_context(|| format!("Failed to load run table: {}", path.display()))
    }

    fn settings(&self, config: &Config) -> MiningSettings {
        MiningSettings {
            limits: config.mining.limits(),
            min_support: config.mining.min_support,
            fallback_min_support: config.mining.fallback_min_support,
            baseline_support: config.mining.baseline_support,
            output_dir: config.output.dir.clone(),
            show_progress: !self.quiet,
        }
    }

    /// Sends a report to `--output` or stdout.
    fn emit<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> crate::error::Result<()>,
    {
        if let Some(output_path) = &self.output {
            let file = File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            info!("Report written to: {}", output_path.display());
        } else {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)?;
        }
        Ok(())
    }

    fn execute_ingest(
        &self,
        config: &Config,
        params: &Path,
        report: &Path,
        csv: Option<&Path>,
    ) -> Result<()> {
        let csv = csv.map_or_else(|| self.runs_path(config), Path::to_path_buf);
        let catalog = MessageCatalog::new(config.catalog.extra_messages.clone());

        let row = ingest(params, report, &csv, &catalog, &config.ingest.labels)
            .with_context(|| format!("Failed to ingest {}", report.display()))?;

        eprintln!(
            "{} build {} ({}, {} steps, {} failed) {} {}",
            if row.created { "Created table with" } else { "Appended" },
            row.build_id,
            row.result,
            row.steps,
            row.failed,
            dim("→"),
            csv.display()
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_mine(
        &self,
        config: &Config,
        format: OutputFormat,
        pretty: bool,
        range: (u64, u64),
        min_support: Option<f64>,
        baseline_support: Option<f64>,
        write: bool,
    ) -> Result<()> {
        let min_support = min_support.unwrap_or(config.mining.min_support);
        let baseline_support = baseline_support.unwrap_or(config.mining.baseline_support);
        check_support("--min-support", min_support)?;
        check_support("--baseline-support", baseline_support)?;

        let store = self.open_store(config)?;
        let miner = PatternMiner::new(&store, self.settings(config));

        info!(
            "Mining builds {} - {} (support {min_support}, baseline {baseline_support})",
            range.0, range.1
        );
        let insights = miner
            .mine(range.0, range.1, min_support, baseline_support, write)
            .await?;

        self.emit(|out| export_insights(&insights, format, pretty, out))
    }

    async fn execute_search(
        &self,
        config: &Config,
        format: OutputFormat,
        pretty: bool,
        write: bool,
    ) -> Result<()> {
        let store = self.open_store(config)?;
        let miner = PatternMiner::new(&store, self.settings(config));

        let insights = miner.search(write).await?;

        self.emit(|out| export_insights(&insights, format, pretty, out))
    }

    fn execute_explain(
        &self,
        config: &Config,
        format: OutputFormat,
        pretty: bool,
        pattern: &str,
        start: Option<u64>,
        end: Option<u64>,
    ) -> Result<()> {
        let tokens: Vec<&str> = pattern
            .split_whitespace()
            .filter(|token| *token != "==>")
            .collect();

        let store = self.open_store(config)?;
        let window = load_window(&store, start, end)?;
        let runs: Vec<Run> = window.runs.into_iter().cloned().collect();

        let explanation = explain(&tokens, &runs)?;
        let report = ExplanationReport::from(&explanation);

        self.emit(|out| export_explanation(&report, format, pretty, out))
    }

    fn execute_counts(
        &self,
        config: &Config,
        format: OutputFormat,
        pretty: bool,
        start: Option<u64>,
        end: Option<u64>,
    ) -> Result<()> {
        let store = self.open_store(config)?;
        let window = load_window(&store, start, end)?;

        let report = FrequencyReport {
            min_id: window.min_id,
            max_id: window.max_id,
            total_runs: window.len(),
            failing_runs: window.failing().len(),
            excluded_rows: store.exclusions().total(),
            failures: count_failures(&window.runs),
            error_categories: count_error_categories(&window.runs),
        };

        self.emit(|out| export_frequencies(&report, format, pretty, out))
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let format = self.format.unwrap_or(config.output.format);
        let pretty = self.pretty || config.output.pretty;

        match &self.command {
            Commands::Ingest {
                params,
                report,
                csv,
            } => self.execute_ingest(&config, params, report, csv.as_deref()),
            Commands::Mine {
                start,
                end,
                min_support,
                baseline_support,
                write,
            } => {
                self.execute_mine(
                    &config,
                    format,
                    pretty,
                    (*start, *end),
                    *min_support,
                    *baseline_support,
                    *write,
                )
                .await
            }
            Commands::Search { write } => {
                self.execute_search(&config, format, pretty, *write).await
            }
            Commands::Explain {
                pattern,
                start,
                end,
            } => self.execute_explain(&config, format, pretty, pattern, *start, *end),
            Commands::Counts { start, end } => {
                self.execute_counts(&config, format, pretty, *start, *end)
            }
        }
    }
}

/// Loads `[start, end]`, each bound defaulting to the table's extent.
fn load_window(
    store: &RunStore,
    start: Option<u64>,
    end: Option<u64>,
) -> crate::error::Result<RunWindow<'_>> {
    let (min_id, max_id) = store.id_extent()?;
    store.load(start.unwrap_or(min_id), end.unwrap_or(max_id))
}
