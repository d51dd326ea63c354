//! Error taxonomy for the prediction and sampling pipelines
//!
//! Per-cell and per-trial anomalies are absorbed where they happen. These
//! variants cover the cases that must reach the caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PowerError {
    /// None of the required report columns exist in the input table
    #[error("no required columns found; available columns: {}", available.join(", "))]
    NoRequiredColumns { available: Vec<String> },

    /// A pinned model feature is absent from the aggregated row
    #[error("feature '{0}' missing from aggregated metrics")]
    MissingFeature(String),

    #[error("invalid mode '{0}'; choose from: avg, min, peak, all")]
    UnsupportedMode(String),

    /// Every energy trial of a session was discarded
    #[error("all {attempted} energy measurements failed; unable to calculate stats")]
    AllTrialsFailed { attempted: usize },

    /// The workload exited unsuccessfully on every trial of a session
    #[error("workload '{command}' failed on every run: {reason}")]
    WorkloadFailed { command: String, reason: String },

    #[error("profiler executable not found at {}", .0.display())]
    ToolUnavailable(PathBuf),

    #[error("workload did not finish within {timeout:?}")]
    WorkloadTimeout { timeout: Duration },

    #[error("{what} not ready after {waited:?}")]
    NotReady { what: String, waited: Duration },
}
