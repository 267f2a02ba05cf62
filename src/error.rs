use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeqLensError {
    #[error("No runs found with build id between {min} and {max}")]
    EmptyRange { min: u64, max: u64 },

    #[error("Run table contains no valid runs")]
    EmptyTable,

    #[error("No failing step reaches the required count of {required} ({failing} failing runs)")]
    InsufficientSupport { required: usize, failing: usize },

    #[error("Baseline mining timed out after {0:?}")]
    BaselineTimeout(Duration),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid run table: {0}")]
    RunTable(String),

    #[error("Invalid test report: {0}")]
    Report(String),

    #[error("Invalid parameter file: {0}")]
    Params(String),

    #[error("Mining task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SeqLensError>;
