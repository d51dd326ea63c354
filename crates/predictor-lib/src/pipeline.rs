//! End-to-end report processing
//!
//! report (tab-delimited) -> canonical CSV -> L2 aggregate -> features ->
//! per-target power estimates, plus the combined `full_results.csv` record.

use crate::error::PowerError;
use crate::models::{AggregatedRow, PowerPrediction, PredictionMode, RunRecord};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::predictor::{FeatureVectorBuilder, ModelSource, PowerPredictor};
use crate::reconciler::{MetricReconciler, RawMetricsTable};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};

/// File name of the combined output record
pub const FULL_RESULTS_FILE: &str = "full_results.csv";

/// Raw profiler exports are tab-delimited
pub const REPORT_DELIMITER: u8 = b'\t';

/// Turns raw profiler reports into canonical tables
pub struct ReportConverter {
    reconciler: MetricReconciler,
    cpu_brand: String,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl ReportConverter {
    pub fn new(cpu_brand: impl Into<String>, logger: StructuredLogger) -> Self {
        Self {
            reconciler: MetricReconciler::default(),
            cpu_brand: cpu_brand.into(),
            metrics: PipelineMetrics::new(),
            logger,
        }
    }

    /// Reconcile against the configured CPU brand
    pub fn reconcile(&self, table: &RawMetricsTable) -> Result<RawMetricsTable> {
        self.reconciler.reconcile(table, &self.cpu_brand).map_err(|e| {
            if matches!(e, PowerError::NoRequiredColumns { .. }) {
                self.metrics.inc_reconcile_failures();
            }
            error!(error = %e, "Report reconciliation failed");
            e.into()
        })
    }

    /// Convert a raw profiler report into the canonical CSV at `output`
    pub fn convert_report(&self, report: &Path, output: &Path) -> Result<RawMetricsTable> {
        let raw = RawMetricsTable::read_delimited(report, REPORT_DELIMITER)?;
        let canonical = self
            .reconcile(&raw)
            .with_context(|| format!("Failed to convert {}", report.display()))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        canonical.write_csv_path(output)?;
        self.logger
            .log_conversion(report, output, canonical.row_count(), canonical.columns().len());
        Ok(canonical)
    }

    /// Reconcile and collapse to the single aggregate row of one run
    pub fn aggregate(&self, table: &RawMetricsTable, source: &str) -> Result<AggregatedRow> {
        let canonical = self.reconcile(table)?;
        Ok(self.reconciler.aggregate(&canonical, 1, source))
    }
}

/// Composes report conversion, feature building and prediction
pub struct PowerPipeline<S: ModelSource> {
    converter: ReportConverter,
    predictor: PowerPredictor<S>,
    logger: StructuredLogger,
}

impl<S: ModelSource> PowerPipeline<S> {
    pub fn new(predictor: PowerPredictor<S>, cpu_brand: impl Into<String>, logger: StructuredLogger) -> Self {
        Self {
            converter: ReportConverter::new(cpu_brand, logger.clone()),
            predictor,
            logger,
        }
    }

    /// Convert a raw profiler report into the canonical CSV at `output`
    pub fn convert_report(&self, report: &Path, output: &Path) -> Result<RawMetricsTable> {
        self.converter.convert_report(report, output)
    }

    /// Aggregate a table and predict the targets of `mode`
    pub fn predict_table(
        &self,
        table: &RawMetricsTable,
        source: &str,
        mode: PredictionMode,
    ) -> Result<(AggregatedRow, PowerPrediction)> {
        let row = self.converter.aggregate(table, source)?;
        let features = FeatureVectorBuilder::build(&row)?;
        let prediction = self.predictor.predict(&features, mode)?;
        self.logger.log_prediction(source, &prediction);
        Ok((row, prediction))
    }

    /// Predict from a converted (comma-delimited) CSV
    pub fn predict_csv(&self, csv: &Path, mode: PredictionMode) -> Result<PowerPrediction> {
        info!(file = %csv.display(), mode = %mode, "Running power prediction");
        let table = RawMetricsTable::read_delimited(csv, b',')?;
        let source = csv
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (_, prediction) = self
            .predict_table(&table, &source, mode)
            .with_context(|| format!("Prediction failed for {}", csv.display()))?;
        Ok(prediction)
    }
}

/// Write the single-row combined record; missing values stay empty
pub fn write_run_record(path: &Path, record: &RunRecord) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.serialize(record)?;
    wtr.flush()?;
    info!(file = %path.display(), "Combined results saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnergyStats, FeatureVector, PowerTarget};
    use crate::predictor::PowerModel;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Model returning the sum of its features plus a per-target offset
    struct SumModel(f64);

    impl PowerModel for SumModel {
        fn predict(&self, features: &FeatureVector) -> Result<f64> {
            Ok(features.to_array().iter().sum::<f64>() + self.0)
        }
    }

    struct SumSource;

    impl ModelSource for SumSource {
        fn load(&self, target: PowerTarget) -> Result<Arc<dyn PowerModel>> {
            let offset = match target {
                PowerTarget::Avg => 0.0,
                PowerTarget::Min => -1.0,
                PowerTarget::Peak => 1.0,
            };
            Ok(Arc::new(SumModel(offset)))
        }
    }

    const REPORT: &str = "Function\tCPU Time\tClockticks\tInstructions Retired\tCPI Rate\t\
Retiring(%)\tFront-End Bound(%)\tBad Speculation(%)\tBack-End Bound(%)\tAverage CPU Frequency\tModule\n\
main\t75.4814\t0\t0\t0\t0\t0\t0\t0\t0\tapp\n";

    fn pipeline() -> PowerPipeline<SumSource> {
        PowerPipeline::new(
            PowerPredictor::new(SumSource),
            "Intel(R) Xeon(R) Gold 6230",
            StructuredLogger::new("test-host"),
        )
    }

    #[test]
    fn test_convert_then_predict() {
        let temp_dir = TempDir::new().unwrap();
        let report = temp_dir.path().join("vtune_report_raw.csv");
        std::fs::write(&report, REPORT).unwrap();
        let converted = temp_dir.path().join("out").join("transformed_vtune_output.csv");

        let pipeline = pipeline();
        let canonical = pipeline.convert_report(&report, &converted).unwrap();
        assert_eq!(canonical.row_count(), 1);

        let written = std::fs::read_to_string(&converted).unwrap();
        assert!(written.starts_with("Function / Call Stack,CPU Time,Clockticks"));
        assert!(written.contains("Retiring,Front-End Bound"));

        // CPU Time sits exactly at its maximum, so it normalizes to 100
        let prediction = pipeline.predict_csv(&converted, PredictionMode::All).unwrap();
        assert_eq!(prediction[&PowerTarget::Avg], 100.0);
        assert_eq!(prediction[&PowerTarget::Min], 99.0);
        assert_eq!(prediction[&PowerTarget::Peak], 101.0);
    }

    #[test]
    fn test_report_without_required_columns() {
        let temp_dir = TempDir::new().unwrap();
        let report = temp_dir.path().join("report.csv");
        std::fs::write(&report, "Foo\tBar\n1\t2\n").unwrap();

        let err = pipeline()
            .convert_report(&report, &temp_dir.path().join("out.csv"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PowerError>(),
            Some(PowerError::NoRequiredColumns { .. })
        ));
    }

    #[test]
    fn test_missing_feature_fails_prediction() {
        let table = RawMetricsTable::from_columns(vec![
            ("Function".to_string(), vec!["main".to_string()]),
            ("CPU Time".to_string(), vec!["1.0".to_string()]),
        ]);
        let err = pipeline()
            .predict_table(&table, "partial.csv", PredictionMode::Single(PowerTarget::Avg))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PowerError>(),
            Some(PowerError::MissingFeature(name)) if name == "Clockticks"
        ));
    }

    #[test]
    fn test_run_record_leaves_missing_cells_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(FULL_RESULTS_FILE);

        let mut prediction = PowerPrediction::new();
        prediction.insert(PowerTarget::Avg, 42.5);
        let stats = EnergyStats {
            avg_energy_uj: 2.0,
            min_energy_uj: 1.0,
            max_energy_uj: 3.0,
            avg_power_w: 0.5,
            min_power_w: 0.25,
            max_power_w: 0.75,
            successful_runs: 3,
        };
        write_run_record(&path, &RunRecord::new(Some(&prediction), Some(&stats), None)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date_and_time,ml_power_avg,ml_power_min,ml_power_peak,rapl_energy_uj_avg,\
rapl_energy_uj_min,rapl_energy_uj_max,rapl_power_avg,rapl_power_min,rapl_power_peak,cli_app_command"
        );
        let row = lines.next().unwrap();
        assert!(row.ends_with(",42.5,,,2.0,1.0,3.0,0.5,0.25,0.75,N/A"));
    }
}
