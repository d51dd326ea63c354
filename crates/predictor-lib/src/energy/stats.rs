//! Aggregation of successful energy trials

use crate::error::PowerError;
use crate::models::{EnergySample, EnergyStats};

/// Compute mean/min/max energy and power over the successful trials
///
/// Fails when no trial succeeded so callers can tell an all-failed session
/// apart from one that measured zero energy.
pub fn aggregate_samples(samples: &[EnergySample], attempted: usize) -> Result<EnergyStats, PowerError> {
    if samples.is_empty() {
        return Err(PowerError::AllTrialsFailed { attempted });
    }

    let energies: Vec<f64> = samples.iter().map(|s| s.energy_uj).collect();
    let powers: Vec<f64> = samples.iter().map(|s| s.power_w).collect();

    Ok(EnergyStats {
        avg_energy_uj: mean(&energies),
        min_energy_uj: energies.iter().copied().fold(f64::INFINITY, f64::min),
        max_energy_uj: energies.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        avg_power_w: mean(&powers),
        min_power_w: powers.iter().copied().fold(f64::INFINITY, f64::min),
        max_power_w: powers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        successful_runs: samples.len(),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Format microjoules with thousands separators and two decimals
pub fn format_microjoules(uj: f64) -> String {
    let fixed = format!("{:.2}", uj.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if uj < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part} µJ")
}
