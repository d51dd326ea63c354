//! Power prediction commands

use anyhow::{Context, Result};
use colored::Colorize;
use predictor_lib::{
    pipeline::{PowerPipeline, ReportConverter, REPORT_DELIMITER},
    predictor::{FeatureVectorBuilder, ModelDirectory, PowerPredictor, FEATURE_NAMES},
    reconciler::RawMetricsTable,
    PredictionMode,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;

use crate::output::{format_watts, print_info, print_json, print_table, OutputFormat};
use crate::structured_logger;

/// Row for the prediction table
#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Power")]
    #[serde(skip)]
    formatted: String,
    #[tabled(skip)]
    watts: f64,
}

/// Row for the feature table
#[derive(Tabled, Serialize)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Value")]
    value: f64,
}

#[derive(Serialize)]
struct PredictionOutput<'a> {
    file: String,
    mode: String,
    cpu_brand: &'a str,
    predictions: Vec<PredictionRow>,
}

/// Predict power for a converted CSV (or a raw tab-delimited report)
pub fn predict(
    file: &Path,
    mode: PredictionMode,
    raw: bool,
    model_dir: PathBuf,
    cpu_brand: &str,
    format: OutputFormat,
) -> Result<()> {
    let predictor = PowerPredictor::new(ModelDirectory::new(model_dir));
    let pipeline = PowerPipeline::new(predictor, cpu_brand, structured_logger());

    let delimiter = if raw { REPORT_DELIMITER } else { b',' };
    let table = RawMetricsTable::read_delimited(file, delimiter)?;
    let source = file.display().to_string();
    let (_, prediction) = pipeline
        .predict_table(&table, &source, mode)
        .with_context(|| format!("Prediction failed for {}", file.display()))?;

    let rows: Vec<PredictionRow> = prediction
        .iter()
        .map(|(target, watts)| PredictionRow {
            target: target.to_string(),
            formatted: format_watts(*watts),
            watts: *watts,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&PredictionOutput {
            file: source,
            mode: mode.to_string(),
            cpu_brand,
            predictions: rows,
        }),
        OutputFormat::Table => {
            println!("{} {}", "Power prediction for".bold(), source.cyan());
            print_table(&rows, format);
        }
    }
    Ok(())
}

/// Show the normalized feature vector the models would receive
pub fn features(file: &Path, raw: bool, cpu_brand: &str, format: OutputFormat) -> Result<()> {
    let delimiter = if raw { REPORT_DELIMITER } else { b',' };
    let table = RawMetricsTable::read_delimited(file, delimiter)?;
    let name = file.display().to_string();

    let row = ReportConverter::new(cpu_brand, structured_logger()).aggregate(&table, &name)?;
    let vector = FeatureVectorBuilder::build(&row)?;

    let rows: Vec<FeatureRow> = FEATURE_NAMES
        .iter()
        .zip(vector.to_array())
        .map(|(feature, value)| FeatureRow {
            feature: feature.to_string(),
            value,
        })
        .collect();

    if format == OutputFormat::Table {
        print_info(&format!("Normalized L2 features of {}", name));
    }
    print_table(&rows, format);
    Ok(())
}
