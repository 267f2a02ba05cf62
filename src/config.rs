use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mining::MiningLimits;

/// Configuration file structure for `SeqLens`.
///
/// Lets users keep the run-table location, mining thresholds and output
/// preferences between invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    /// Support thresholds and resource limits
    #[serde(default)]
    pub mining: MiningConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,

    /// Additional failure-message fragments
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataConfig {
    /// Run table produced by `seqlens ingest`
    #[serde(default = "default_runs_file")]
    pub runs_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MiningConfig {
    /// Failure support of `mine` and of the first `search` attempt
    #[serde(default = "default_min_support")]
    pub min_support: f64,

    /// Failure support of the `search` retry
    #[serde(default = "default_fallback_min_support")]
    pub fallback_min_support: f64,

    /// Support threshold over successful runs
    #[serde(default = "default_baseline_support")]
    pub baseline_support: f64,

    /// Wall-clock budget of one mining call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Longest pattern to mine; unlimited when unset
    pub max_pattern_length: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Directory receiving persisted pattern tables
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Checked after the built-in fragments, in order
    #[serde(default)]
    pub extra_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IngestConfig {
    /// Environment label columns, in order; parameter-file order when empty
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            runs_file: default_runs_file(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            fallback_min_support: default_fallback_min_support(),
            baseline_support: default_baseline_support(),
            timeout_secs: default_timeout_secs(),
            max_pattern_length: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Summary,
            pretty: false,
            dir: default_output_dir(),
        }
    }
}

impl MiningConfig {
    pub fn limits(&self) -> MiningLimits {
        MiningLimits {
            timeout: Duration::from_secs(self.timeout_secs),
            max_length: self.max_pattern_length,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min-support", self.min_support),
            ("fallback-min-support", self.fallback_min_support),
            ("baseline-support", self.baseline_support),
        ] {
            check_support(name, value)?;
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("mining.timeout-secs must be greater than zero");
        }
        Ok(())
    }
}

/// Rejects support thresholds outside `(0, 1]`.
pub fn check_support(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        anyhow::bail!("{name} must be in (0, 1], got {value}")
    }
}

fn default_runs_file() -> PathBuf {
    PathBuf::from("dataframe.csv")
}

fn default_min_support() -> f64 {
    0.15
}

fn default_fallback_min_support() -> f64 {
    0.1
}

fn default_baseline_support() -> f64 {
    0.1
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./seqlens.toml
    /// 3. ./seqlens.json
    /// 4. ./seqlens.yaml
    /// 5. ./seqlens.yml
    /// 6. `<user config dir>/seqlens/seqlens.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["seqlens.toml", "seqlens.json", "seqlens.yaml", "seqlens.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = user_config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config
            .mining
            .validate()
            .with_context(|| format!("Invalid mining section in {}", path.display()))?;
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("seqlens").join("seqlens.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.runs_file, PathBuf::from("dataframe.csv"));
        assert!((config.mining.min_support - 0.15).abs() < f64::EPSILON);
        assert!((config.mining.fallback_min_support - 0.1).abs() < f64::EPSILON);
        assert!((config.mining.baseline_support - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.mining.timeout_secs, 300);
        assert_eq!(config.output.format, OutputFormat::Summary);
        assert!(config.catalog.extra_messages.is_empty());
        assert!(config.ingest.labels.is_empty());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[data]
runs-file = "/data/runs.csv"

[mining]
min-support = 0.2
timeout-secs = 30
max-pattern-length = 5

[output]
format = "json"
dir = "patterns"

[catalog]
extra-messages = ["etcd leader changed"]

[ingest]
labels = ["OCP_VERSION", "IP_FAMILY"]
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.data.runs_file, PathBuf::from("/data/runs.csv"));
        assert!((config.mining.min_support - 0.2).abs() < f64::EPSILON);
        assert!((config.mining.baseline_support - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.dir, PathBuf::from("patterns"));
        assert_eq!(config.catalog.extra_messages, vec!["etcd leader changed"]);
        assert_eq!(config.ingest.labels, vec!["OCP_VERSION", "IP_FAMILY"]);

        let limits = config.mining.limits();
        assert_eq!(limits.timeout, Duration::from_secs(30));
        assert_eq!(limits.max_length, Some(5));
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "mining": {
    "baseline-support": 0.05
  },
  "output": {
    "format": "csv",
    "pretty": true
  }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert!((config.mining.baseline_support - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "data:\n  runs-file: history.csv\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.data.runs_file, PathBuf::from("history.csv"));
    }

    #[test]
    fn test_rejects_out_of_range_support() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[mining]\nmin-support = 1.5\n").unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("min-support must be in (0, 1]"));
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nonexistent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_check_support_bounds() {
        assert!(check_support("min-support", 1.0).is_ok());
        assert!(check_support("min-support", 0.0).is_err());
        assert!(check_support("min-support", -0.1).is_err());
    }
}
