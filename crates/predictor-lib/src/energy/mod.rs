//! Direct energy measurement of a workload
//!
//! Runs a workload repeatedly between reads of a hardware package-energy
//! counter. Trials without usable readings are discarded without aborting
//! the session; statistics are computed over the trials that remain.

mod rapl;
mod stats;
mod workload;


pub use rapl::{discover_domains, energy_delta, RaplCounter, RaplDomain, DEFAULT_POWERCAP_ROOT};
pub use stats::{aggregate_samples, format_microjoules};
pub use workload::ShellWorkload;

use crate::error::PowerError;
use crate::models::{EnergySample, EnergyStats};
use crate::observability::{PipelineMetrics, StructuredLogger};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Default number of trials per session
pub const DEFAULT_RUNS: usize = 5;

/// Raw counter output for one measurement window
#[derive(Debug, Clone, PartialEq)]
pub struct CounterReading {
    /// Package energy per socket, in microjoules
    pub package_uj: Vec<f64>,
    /// Wall-clock length of the window
    pub duration: Duration,
}

impl CounterReading {
    /// Convert to a sample, or `None` when there are no package readings
    ///
    /// Energy is summed across sockets. A zero-length window yields zero
    /// power.
    pub fn to_sample(&self) -> Option<EnergySample> {
        if self.package_uj.is_empty() {
            return None;
        }
        let energy_uj: f64 = self.package_uj.iter().sum();
        let secs = self.duration.as_secs_f64();
        let power_w = if secs > 0.0 {
            (energy_uj / 1_000_000.0) / secs
        } else {
            0.0
        };
        Some(EnergySample { energy_uj, power_w })
    }
}

/// Trait for hardware energy counters
#[async_trait]
pub trait EnergyCounter: Send {
    /// Start a measurement window
    async fn begin(&mut self) -> Result<()>;

    /// Close the window; `None` when the counter produced nothing usable
    async fn end(&mut self) -> Result<Option<CounterReading>>;
}

/// Result of running a workload to completion
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadOutcome {
    Completed,
    Failed(String),
}

/// Trait for the program being measured
#[async_trait]
pub trait Workload: Send + Sync {
    /// Run to completion
    ///
    /// Errors are reserved for conditions that make further trials
    /// pointless (spawn failure, timeout).
    async fn run(&self) -> Result<WorkloadOutcome>;

    fn describe(&self) -> String;
}

/// How a single trial ended
enum Trial {
    Measured(EnergySample),
    /// No usable counter reading
    Discarded,
    /// The workload exited unsuccessfully
    WorkloadFailed(String),
}

/// Runs measurement sessions against an energy counter
pub struct EnergySampler<C: EnergyCounter> {
    counter: C,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl<C: EnergyCounter> EnergySampler<C> {
    pub fn new(counter: C, logger: StructuredLogger) -> Self {
        Self {
            counter,
            metrics: PipelineMetrics::new(),
            logger,
        }
    }

    /// Run one trial; `Ok(None)` means the trial was discarded
    pub async fn measure_trial(&mut self, workload: &dyn Workload) -> Result<Option<EnergySample>> {
        match self.run_trial(workload).await? {
            Trial::Measured(sample) => Ok(Some(sample)),
            Trial::Discarded | Trial::WorkloadFailed(_) => Ok(None),
        }
    }

    async fn run_trial(&mut self, workload: &dyn Workload) -> Result<Trial> {
        if let Err(e) = self.counter.begin().await {
            self.discard(workload, &format!("counter did not start: {e:#}"));
            return Ok(Trial::Discarded);
        }

        let outcome = workload.run().await?;

        let reading = match self.counter.end().await {
            Ok(reading) => reading,
            Err(e) => {
                self.discard(workload, &format!("counter did not stop: {e:#}"));
                return Ok(Trial::Discarded);
            }
        };

        if let WorkloadOutcome::Failed(reason) = outcome {
            self.discard(workload, &reason);
            return Ok(Trial::WorkloadFailed(reason));
        }

        match reading.as_ref().and_then(CounterReading::to_sample) {
            Some(sample) => Ok(Trial::Measured(sample)),
            None => {
                self.discard(workload, "no package energy readings");
                Ok(Trial::Discarded)
            }
        }
    }

    /// Run `runs` sequential trials and aggregate the successful ones
    ///
    /// A workload that exits unsuccessfully on every run fails with
    /// `WorkloadFailed` rather than `AllTrialsFailed`.
    pub async fn measure(&mut self, workload: &dyn Workload, runs: usize) -> Result<EnergyStats> {
        info!(runs, command = %workload.describe(), "Starting RAPL energy measurement");

        let mut samples = Vec::with_capacity(runs);
        let mut workload_failures = Vec::new();
        for trial in 1..=runs {
            info!("RAPL measurement run {}/{}", trial, runs);
            self.metrics.inc_energy_trials();
            match self.run_trial(workload).await? {
                Trial::Measured(sample) => samples.push(sample),
                Trial::WorkloadFailed(reason) => workload_failures.push(reason),
                Trial::Discarded => {}
            }
        }

        if runs > 0 && workload_failures.len() == runs {
            return Err(PowerError::WorkloadFailed {
                command: workload.describe(),
                reason: workload_failures.pop().unwrap_or_default(),
            }
            .into());
        }

        let stats = aggregate_samples(&samples, runs)?;
        self.logger.log_energy_stats(&workload.describe(), &stats);
        Ok(stats)
    }

    fn discard(&self, workload: &dyn Workload, reason: &str) {
        self.metrics.inc_energy_trials_failed();
        self.logger.log_trial_discarded(&workload.describe(), reason);
    }

    pub fn into_counter(self) -> C {
        self.counter
    }
}
