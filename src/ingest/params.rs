use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;

use crate::error::{Result, SeqLensError};
use crate::runs::{BUILD_ID, RESULT};

/// Environment of one CI job, read from its `KEY=VALUE` parameter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParameters {
    pub build_id: u64,
    pub result: String,
    /// Every other key, in file order
    pub labels: IndexMap<String, String>,
}

impl JobParameters {
    /// Reads a parameter file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or `Params` if it lacks
    /// `BUILD_ID` or `RESULT`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parses `KEY=VALUE` lines. Blank lines, `#` comments and lines without
    /// `=` are ignored; a repeated key keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns `Params` when `BUILD_ID` or `RESULT` is missing, or when
    /// `BUILD_ID` is not an unsigned integer.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut values: IndexMap<String, String> = IndexMap::new();

        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                debug!("Ignoring parameter line without '=': {line}");
                continue;
            };
            values.insert(key.trim().to_string(), value.trim().to_string());
        }

        let build_id = values
            .shift_remove(BUILD_ID)
            .ok_or_else(|| SeqLensError::Params(format!("missing {BUILD_ID}")))?;
        let build_id = build_id
            .parse()
            .map_err(|_| SeqLensError::Params(format!("invalid {BUILD_ID} '{build_id}'")))?;
        let result = values
            .shift_remove(RESULT)
            .ok_or_else(|| SeqLensError::Params(format!("missing {RESULT}")))?;

        Ok(Self {
            build_id,
            result,
            labels: values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_in_file_order() {
        let params = JobParameters::parse(
            "MERIDIO_VERSION=v1.0.0\nTAPA_VERSION=v1.1.0\nBUILD_ID=412\n\
             KUBERNETES_VERSION=v1.26\nIP_FAMILY=dualstack\nRESULT=FAILURE\n",
        )
        .unwrap();

        assert_eq!(params.build_id, 412);
        assert_eq!(params.result, "FAILURE");
        let keys: Vec<&str> = params.labels.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["MERIDIO_VERSION", "TAPA_VERSION", "KUBERNETES_VERSION", "IP_FAMILY"]
        );
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let params =
            JobParameters::parse("# job\n\nBUILD_ID = 7\nnot a pair\nRESULT=SUCCESS\n").unwrap();
        assert_eq!(params.build_id, 7);
        assert!(params.labels.is_empty());
    }

    #[test]
    fn keeps_equals_signs_inside_values() {
        let params = JobParameters::parse("BUILD_ID=1\nRESULT=SUCCESS\nFLAGS=a=b\n").unwrap();
        assert_eq!(params.labels["FLAGS"], "a=b");
    }

    #[test]
    fn requires_build_id_and_result() {
        assert!(matches!(
            JobParameters::parse("RESULT=SUCCESS\n"),
            Err(SeqLensError::Params(message)) if message.contains(BUILD_ID)
        ));
        assert!(matches!(
            JobParameters::parse("BUILD_ID=3\n"),
            Err(SeqLensError::Params(message)) if message.contains(RESULT)
        ));
    }

    #[test]
    fn rejects_non_numeric_build_id() {
        assert!(matches!(
            JobParameters::parse("BUILD_ID=abc\nRESULT=SUCCESS\n"),
            Err(SeqLensError::Params(_))
        ));
    }
}
