//! Core data models for the power predictor

use crate::error::PowerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Single-row L2 aggregate of one profiled run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    /// Sequence index of the source file within a batch (1-based)
    pub index: usize,
    pub file_name: String,
    /// Metric name to aggregated value, in table column order
    pub metrics: Vec<(String, f64)>,
}

impl AggregatedRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|(metric, _)| metric == name)
            .map(|(_, value)| *value)
    }
}

/// Feature vector consumed by the power models, in model-pinned order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cpu_time: f64,
    pub clockticks: f64,
    pub instructions_retired: f64,
    pub cpi_rate: f64,
    pub retiring: f64,
    pub front_end_bound: f64,
    pub bad_speculation: f64,
    pub back_end_bound: f64,
    pub average_cpu_frequency: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; 9] {
        [
            self.cpu_time,
            self.clockticks,
            self.instructions_retired,
            self.cpi_rate,
            self.retiring,
            self.front_end_bound,
            self.bad_speculation,
            self.back_end_bound,
            self.average_cpu_frequency,
        ]
    }
}

/// Power figure a model is trained to estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PowerTarget {
    #[serde(rename = "AVG")]
    Avg,
    #[serde(rename = "MIN")]
    Min,
    #[serde(rename = "PEAK")]
    Peak,
}

impl PowerTarget {
    pub const ALL: [PowerTarget; 3] = [PowerTarget::Avg, PowerTarget::Min, PowerTarget::Peak];

    /// Result label reported for this target
    pub fn label(&self) -> &'static str {
        match self {
            PowerTarget::Avg => "AVG",
            PowerTarget::Min => "MIN",
            PowerTarget::Peak => "PEAK",
        }
    }

    /// Key used for the on-disk model file of this target
    pub fn key(&self) -> &'static str {
        match self {
            PowerTarget::Avg => "avg",
            PowerTarget::Min => "min",
            PowerTarget::Peak => "peak",
        }
    }
}

impl fmt::Display for PowerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prediction mode selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
    Single(PowerTarget),
    All,
}

impl PredictionMode {
    /// Targets evaluated by this mode
    pub fn targets(&self) -> Vec<PowerTarget> {
        match self {
            PredictionMode::Single(target) => vec![*target],
            PredictionMode::All => PowerTarget::ALL.to_vec(),
        }
    }
}

impl FromStr for PredictionMode {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(PredictionMode::Single(PowerTarget::Avg)),
            "min" => Ok(PredictionMode::Single(PowerTarget::Min)),
            "peak" => Ok(PredictionMode::Single(PowerTarget::Peak)),
            "all" => Ok(PredictionMode::All),
            other => Err(PowerError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionMode::Single(target) => f.write_str(target.key()),
            PredictionMode::All => f.write_str("all"),
        }
    }
}

/// Predicted wattage per target label
pub type PowerPrediction = BTreeMap<PowerTarget, f64>;

/// One successful energy trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergySample {
    /// Package energy summed over all sockets, in microjoules
    pub energy_uj: f64,
    /// Average power over the trial, in watts
    pub power_w: f64,
}

/// Aggregate statistics over the successful trials of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyStats {
    pub avg_energy_uj: f64,
    pub min_energy_uj: f64,
    pub max_energy_uj: f64,
    pub avg_power_w: f64,
    pub min_power_w: f64,
    pub max_power_w: f64,
    pub successful_runs: usize,
}

/// Combined output record written to `full_results.csv`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub date_and_time: String,
    pub ml_power_avg: Option<f64>,
    pub ml_power_min: Option<f64>,
    pub ml_power_peak: Option<f64>,
    pub rapl_energy_uj_avg: Option<f64>,
    pub rapl_energy_uj_min: Option<f64>,
    pub rapl_energy_uj_max: Option<f64>,
    pub rapl_power_avg: Option<f64>,
    pub rapl_power_min: Option<f64>,
    pub rapl_power_peak: Option<f64>,
    pub cli_app_command: String,
}

impl RunRecord {
    pub fn new(
        prediction: Option<&PowerPrediction>,
        energy: Option<&EnergyStats>,
        app_command: Option<&str>,
    ) -> Self {
        let estimate = |target| prediction.and_then(|p| p.get(&target).copied());
        Self {
            date_and_time: chrono::Local::now().to_rfc3339(),
            ml_power_avg: estimate(PowerTarget::Avg),
            ml_power_min: estimate(PowerTarget::Min),
            ml_power_peak: estimate(PowerTarget::Peak),
            rapl_energy_uj_avg: energy.map(|e| e.avg_energy_uj),
            rapl_energy_uj_min: energy.map(|e| e.min_energy_uj),
            rapl_energy_uj_max: energy.map(|e| e.max_energy_uj),
            rapl_power_avg: energy.map(|e| e.avg_power_w),
            rapl_power_min: energy.map(|e| e.min_power_w),
            rapl_power_peak: energy.map(|e| e.max_power_w),
            cli_app_command: app_command.unwrap_or("N/A").to_string(),
        }
    }
}
