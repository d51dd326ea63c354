//! Feature vector assembly for the power models
//!
//! The models were trained on exactly nine features in a fixed order.
//! Unlike reconciliation, which tolerates absent columns, this step is
//! strict: a missing feature fails the whole vector.

use crate::error::PowerError;
use crate::models::{AggregatedRow, FeatureVector};

/// Number of input features expected by the models
pub const NUM_FEATURES: usize = 9;

/// Canonical feature names in model input order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "CPU Time",
    "Clockticks",
    "Instructions Retired",
    "CPI Rate",
    "Retiring",
    "Front-End Bound",
    "Bad Speculation",
    "Back-End Bound",
    "Average CPU Frequency",
];

/// Extracts the pinned feature vector from an aggregated row
pub struct FeatureVectorBuilder;

impl FeatureVectorBuilder {
    pub fn build(row: &AggregatedRow) -> Result<FeatureVector, PowerError> {
        let mut values = [0.0; NUM_FEATURES];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            *slot = row
                .get(name)
                .ok_or_else(|| PowerError::MissingFeature(name.to_string()))?;
        }

        let [cpu_time, clockticks, instructions_retired, cpi_rate, retiring, front_end_bound, bad_speculation, back_end_bound, average_cpu_frequency] =
            values;
        Ok(FeatureVector {
            cpu_time,
            clockticks,
            instructions_retired,
            cpi_rate,
            retiring,
            front_end_bound,
            bad_speculation,
            back_end_bound,
            average_cpu_frequency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row() -> AggregatedRow {
        AggregatedRow {
            index: 1,
            file_name: "run.csv".to_string(),
            metrics: FEATURE_NAMES
                .iter()
                .rev()
                .enumerate()
                .map(|(i, name)| (name.to_string(), (NUM_FEATURES - i) as f64))
                .chain(std::iter::once(("Spin Time".to_string(), 99.0)))
                .collect(),
        }
    }

    #[test]
    fn test_builds_in_pinned_order() {
        let features = FeatureVectorBuilder::build(&full_row()).unwrap();
        assert_eq!(
            features.to_array(),
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn test_missing_feature_fails() {
        for missing in FEATURE_NAMES {
            let mut row = full_row();
            row.metrics.retain(|(name, _)| name != missing);
            match FeatureVectorBuilder::build(&row) {
                Err(PowerError::MissingFeature(name)) => assert_eq!(name, missing),
                other => panic!("expected missing feature, got {other:?}"),
            }
        }
    }
}
