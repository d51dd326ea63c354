//! Metric reconciliation
//!
//! Turns a raw, platform-dependent profiler report into canonical columns
//! and collapses the per-function breakdown into one L2-normalized row per
//! profiled run.

mod hybrid;
mod normalization;
mod table;

#[cfg(test)]
mod tests;

pub use hybrid::{
    is_hybrid_cpu, merge_core_types, BREAKDOWN_METRICS, E_CORE_PREFIX, HYBRID_SIGNATURES,
    P_CORE_PREFIX,
};
pub use normalization::{coerce_numeric, l2_norm, NormalizationTable};
pub use table::{Column, RawMetricsTable};

use crate::error::PowerError;
use crate::models::AggregatedRow;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Report column name to canonical name, in output order
pub const COLUMN_MAPPING: [(&str, &str); 14] = [
    ("Function", "Function / Call Stack"),
    ("CPU Time", "CPU Time"),
    ("Clockticks", "Clockticks"),
    ("Instructions Retired", "Instructions Retired"),
    ("CPI Rate", "CPI Rate"),
    ("Retiring(%)", "Retiring"),
    ("Front-End Bound(%)", "Front-End Bound"),
    ("Bad Speculation(%)", "Bad Speculation"),
    ("Back-End Bound(%)", "Back-End Bound"),
    ("Average CPU Frequency", "Average CPU Frequency"),
    ("Module", "Module"),
    ("Function (Full)", "Function (Full)"),
    ("Source File", "Source File"),
    ("Start Address", "Start Address"),
];

/// Canonical identity and static metadata columns, excluded from aggregation
pub const LABEL_COLUMNS: [&str; 5] = [
    "Function / Call Stack",
    "Module",
    "Function (Full)",
    "Source File",
    "Start Address",
];

/// Reconciles raw report tables into canonical aggregates
#[derive(Debug, Clone, Default)]
pub struct MetricReconciler {
    normalization: NormalizationTable,
}

impl MetricReconciler {
    pub fn new(normalization: NormalizationTable) -> Self {
        Self { normalization }
    }

    pub fn normalization(&self) -> &NormalizationTable {
        &self.normalization
    }

    /// Merge hybrid columns, then select and rename the required columns
    ///
    /// Absent columns are skipped. Fails only when none of the required
    /// columns are present, reporting what the table did contain.
    pub fn reconcile(
        &self,
        table: &RawMetricsTable,
        cpu_brand: &str,
    ) -> Result<RawMetricsTable, PowerError> {
        let mut merged;
        let table = if is_hybrid_cpu(cpu_brand) {
            merged = table.clone();
            let metrics = merge_core_types(&mut merged);
            debug!(cpu = %cpu_brand, merged = ?metrics, "Hybrid CPU detected");
            &merged
        } else {
            table
        };

        let mut selected = Vec::new();
        let mut missing = Vec::new();
        for (report_name, canonical_name) in COLUMN_MAPPING {
            let values = table
                .column(report_name)
                .or_else(|| table.column(canonical_name));
            match values {
                Some(values) => selected.push((canonical_name, values.to_vec())),
                None => missing.push(canonical_name),
            }
        }

        if selected.is_empty() {
            return Err(PowerError::NoRequiredColumns {
                available: table.column_names(),
            });
        }
        if !missing.is_empty() {
            debug!(missing = ?missing, "Report lacks some required columns");
        }

        Ok(RawMetricsTable::from_columns(selected))
    }

    /// Collapse a canonical table into a single L2-normalized row
    ///
    /// Every non-label column is coerced to numbers (unparseable cells
    /// become zero), scaled by the normalization table and reduced to the
    /// square root of its sum of squares.
    pub fn aggregate(&self, canonical: &RawMetricsTable, index: usize, file_name: &str) -> AggregatedRow {
        let metrics = canonical
            .columns()
            .iter()
            .filter(|column| !LABEL_COLUMNS.contains(&column.name.as_str()))
            .map(|column| {
                let normalized: Vec<f64> = column
                    .values
                    .iter()
                    .map(|cell| self.normalization.normalize(&column.name, coerce_numeric(cell)))
                    .collect();
                (column.name.clone(), l2_norm(&normalized))
            })
            .collect();

        AggregatedRow {
            index,
            file_name: file_name.to_string(),
            metrics,
        }
    }

    /// Reconcile and aggregate in one step
    pub fn process(
        &self,
        table: &RawMetricsTable,
        cpu_brand: &str,
        index: usize,
        file_name: &str,
    ) -> Result<AggregatedRow, PowerError> {
        let canonical = self.reconcile(table, cpu_brand)?;
        Ok(self.aggregate(&canonical, index, file_name))
    }

    /// Aggregate every `*.csv` file in a directory
    ///
    /// Files are ordered by their numeric `<n>_` prefix (unprefixed files
    /// last) and indexed from 1. Files that fail to parse or reconcile are
    /// logged and skipped.
    pub fn aggregate_directory(&self, dir: &Path, cpu_brand: &str) -> Result<Vec<AggregatedRow>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort_by(|a, b| {
            let key = |p: &PathBuf| {
                let name = file_name_of(p);
                (extract_index(&name).unwrap_or(u64::MAX), name)
            };
            key(a).cmp(&key(b))
        });

        let mut rows = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            let name = file_name_of(path);
            let result = RawMetricsTable::read_delimited(path, b',')
                .and_then(|table| Ok(self.process(&table, cpu_brand, i + 1, &name)?));
            match result {
                Ok(row) => rows.push(row),
                Err(e) => warn!(file = %path.display(), error = %e, "Error processing file"),
            }
        }

        info!(dir = %dir.display(), files = files.len(), aggregated = rows.len(), "Directory aggregated");
        Ok(rows)
    }
}

/// Leading numeric sequence number of a `<n>_name.csv` file name
pub fn extract_index(file_name: &str) -> Option<u64> {
    let (prefix, _) = file_name.split_once('_')?;
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write aggregated rows as CSV with an `index,file_name,<metrics>` header
///
/// The metric columns follow the first row; later rows missing a metric
/// leave the cell empty.
pub fn write_aggregates<W: Write>(rows: &[AggregatedRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let Some(first) = rows.first() else {
        wtr.flush()?;
        return Ok(());
    };

    let mut header = vec!["index".to_string(), "file_name".to_string()];
    header.extend(first.metrics.iter().map(|(name, _)| name.clone()));
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.index.to_string(), row.file_name.clone()];
        record.extend(
            first
                .metrics
                .iter()
                .map(|(name, _)| row.get(name).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
