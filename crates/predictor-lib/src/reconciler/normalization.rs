//! Fixed-constant normalization and L2 aggregation

use std::collections::BTreeMap;

/// Empirical global maxima the models were trained against
const GLOBAL_MAXIMA: [(&str, f64); 9] = [
    ("CPU Time", 75.4814),
    ("Clockticks", 349_650_000_000.0),
    ("Instructions Retired", 212_380_000_000.0),
    ("CPI Rate", 58.0),
    ("Retiring", 1.0),
    ("Front-End Bound", 1.0),
    ("Bad Speculation", 1.0),
    ("Back-End Bound", 1.0),
    ("Average CPU Frequency", 29_568_100_000.0),
];

/// Canonical feature name to normalization constant
///
/// Immutable once built. Features without an entry (or with a zero
/// constant) pass through unscaled.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationTable {
    maxima: BTreeMap<String, f64>,
}

impl NormalizationTable {
    pub fn new<I, S>(maxima: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            maxima: maxima.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.maxima.get(feature).copied()
    }

    /// Rescale a value to a percentage of the feature's global maximum
    pub fn normalize(&self, feature: &str, value: f64) -> f64 {
        match self.get(feature) {
            Some(max) if max != 0.0 => value / max * 100.0,
            _ => value,
        }
    }
}

impl Default for NormalizationTable {
    fn default() -> Self {
        Self::new(GLOBAL_MAXIMA)
    }
}

/// Parse a report cell, treating anything unusable as zero
pub fn coerce_numeric(cell: &str) -> f64 {
    let trimmed = cell.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Square root of the sum of squares
pub fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}
