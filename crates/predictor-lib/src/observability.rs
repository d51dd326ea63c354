//! Observability infrastructure for the power predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency, model loads, energy trials)
//! - Structured logging of pipeline events with tracing

use crate::models::{EnergyStats, PowerPrediction};
use anyhow::Result;
use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_generated: IntCounter,
    prediction_errors: IntCounter,
    model_loads: IntCounter,
    reconcile_failures: IntCounter,
    energy_trials: IntCounter,
    energy_trials_failed: IntCounter,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "power_predictor_prediction_latency_seconds",
                "Time spent evaluating power models for one prediction",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_generated: register_int_counter!(
                "power_predictor_predictions_generated_total",
                "Total number of predictions generated"
            )
            .expect("Failed to register predictions_generated"),

            prediction_errors: register_int_counter!(
                "power_predictor_prediction_errors_total",
                "Total number of model evaluation errors"
            )
            .expect("Failed to register prediction_errors"),

            model_loads: register_int_counter!(
                "power_predictor_model_loads_total",
                "Total number of power models loaded from disk"
            )
            .expect("Failed to register model_loads"),

            reconcile_failures: register_int_counter!(
                "power_predictor_reconcile_failures_total",
                "Reports rejected for lacking every required column"
            )
            .expect("Failed to register reconcile_failures"),

            energy_trials: register_int_counter!(
                "power_predictor_energy_trials_total",
                "Total number of RAPL energy trials attempted"
            )
            .expect("Failed to register energy_trials"),

            energy_trials_failed: register_int_counter!(
                "power_predictor_energy_trials_failed_total",
                "Energy trials discarded for lack of usable readings"
            )
            .expect("Failed to register energy_trials_failed"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_model_loads(&self) {
        self.inner().model_loads.inc();
    }

    pub fn inc_reconcile_failures(&self) {
        self.inner().reconcile_failures.inc();
    }

    pub fn inc_energy_trials(&self) {
        self.inner().energy_trials.inc();
    }

    pub fn inc_energy_trials_failed(&self) {
        self.inner().energy_trials_failed.inc();
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()?)?;
        Ok(())
    }
}

/// Structured logger for pipeline events
///
/// Keeps field names consistent across the profiler and CLI binaries.
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn log_startup(&self, version: &str, cpu_brand: &str) {
        info!(
            event = "profiler_started",
            host = %self.host,
            version = %version,
            cpu = %cpu_brand,
            "CPU power profiler started"
        );
    }

    /// Log a report conversion to canonical columns
    pub fn log_conversion(&self, report: &Path, output: &Path, rows: usize, columns: usize) {
        info!(
            event = "report_converted",
            host = %self.host,
            report = %report.display(),
            output = %output.display(),
            rows = rows,
            columns = columns,
            "Transformed report saved"
        );
    }

    pub fn log_prediction(&self, source: &str, prediction: &PowerPrediction) {
        for (target, watts) in prediction {
            info!(
                event = "prediction_generated",
                host = %self.host,
                source = %source,
                label = %target,
                watts = *watts,
                "Predicted {} power: {:.2} watts",
                target,
                watts
            );
        }
    }

    /// Log an energy session summary
    pub fn log_energy_stats(&self, command: &str, stats: &EnergyStats) {
        info!(
            event = "energy_measured",
            host = %self.host,
            command = %command,
            successful_runs = stats.successful_runs,
            avg_energy_uj = stats.avg_energy_uj,
            min_energy_uj = stats.min_energy_uj,
            max_energy_uj = stats.max_energy_uj,
            avg_power_w = stats.avg_power_w,
            min_power_w = stats.min_power_w,
            max_power_w = stats.max_power_w,
            "RAPL energy analysis complete"
        );
    }

    pub fn log_trial_discarded(&self, command: &str, reason: &str) {
        warn!(
            event = "energy_trial_discarded",
            host = %self.host,
            command = %command,
            reason = %reason,
            "RAPL measurement failed for this run"
        );
    }
}
