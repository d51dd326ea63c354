//! Profiler configuration

use anyhow::{Context, Result};
use predictor_lib::energy::{DEFAULT_POWERCAP_ROOT, DEFAULT_RUNS};
use predictor_lib::profiler::{default_vtune_path, SessionTiming};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "cpu-profiler.toml";

/// Profiler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProfilerConfig {
    /// Host name attached to structured log events
    #[serde(default = "default_host")]
    pub host: String,

    /// VTune command-line executable
    #[serde(default = "default_vtune_path")]
    pub vtune_path: PathBuf,

    /// Directory holding the cpu_power_model_*.onnx files
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_powercap_root")]
    pub powercap_root: PathBuf,

    /// How long an interactive application is profiled, in seconds
    #[serde(default = "default_collection_window")]
    pub collection_window_secs: u64,

    #[serde(default = "default_finalize_timeout")]
    pub finalize_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_energy_runs")]
    pub energy_runs: usize,

    /// Per-run workload timeout in seconds; unset means no limit
    #[serde(default)]
    pub workload_timeout_secs: Option<u64>,
}

fn default_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_powercap_root() -> PathBuf {
    PathBuf::from(DEFAULT_POWERCAP_ROOT)
}

fn default_collection_window() -> u64 {
    120
}

fn default_finalize_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    500
}

fn default_energy_runs() -> usize {
    DEFAULT_RUNS
}

impl ProfilerConfig {
    /// Load from an optional TOML file overlaid with `CPU_PROFILER_*` env vars
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let config = config::Config::builder()
            .add_source(config::File::from(file.as_path()).required(required))
            .add_source(config::Environment::with_prefix("CPU_PROFILER").try_parsing(true))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", file.display()))?;

        config
            .try_deserialize()
            .context("Invalid profiler configuration")
    }

    pub fn timing(&self) -> SessionTiming {
        SessionTiming {
            collection_window: Duration::from_secs(self.collection_window_secs),
            finalize_timeout: Duration::from_secs(self.finalize_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn workload_timeout(&self) -> Option<Duration> {
        self.workload_timeout_secs.map(Duration::from_secs)
    }
}
