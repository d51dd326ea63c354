//! Report conversion and batch aggregation commands

use anyhow::{Context, Result};
use predictor_lib::{
    pipeline::ReportConverter,
    reconciler::{write_aggregates, MetricReconciler},
};
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

use crate::output::{print_json, print_success, print_warning, OutputFormat};
use crate::structured_logger;

/// Convert a raw profiler report into the canonical CSV
pub fn convert(report: &Path, output: &Path, cpu_brand: &str, format: OutputFormat) -> Result<()> {
    let converter = ReportConverter::new(cpu_brand, structured_logger());
    let canonical = converter.convert_report(report, output)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "report": report.display().to_string(),
            "output": output.display().to_string(),
            "rows": canonical.row_count(),
            "columns": canonical.column_names(),
        })),
        OutputFormat::Table => print_success(&format!(
            "Converted {} rows x {} columns to {}",
            canonical.row_count(),
            canonical.columns().len(),
            output.display()
        )),
    }
    Ok(())
}

/// Aggregate every converted CSV in a directory into one row per file
pub fn aggregate(
    dir: &Path,
    output: Option<&Path>,
    cpu_brand: &str,
    format: OutputFormat,
) -> Result<()> {
    let rows = MetricReconciler::default().aggregate_directory(dir, cpu_brand)?;
    if rows.is_empty() {
        print_warning(&format!("No CSV files could be aggregated in {}", dir.display()));
        return Ok(());
    }

    if let Some(path) = output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_aggregates(&rows, file)?;
        print_success(&format!("Saved {} aggregated rows to {}", rows.len(), path.display()));
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut builder = Builder::default();
            let mut header = vec!["Index".to_string(), "File".to_string()];
            header.extend(rows[0].metrics.iter().map(|(name, _)| name.clone()));
            builder.push_record(header);
            for row in &rows {
                let mut record = vec![row.index.to_string(), row.file_name.clone()];
                record.extend(row.metrics.iter().map(|(_, value)| format!("{:.4}", value)));
                builder.push_record(record);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
    Ok(())
}
