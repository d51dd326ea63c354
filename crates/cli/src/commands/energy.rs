//! RAPL energy measurement command

use anyhow::Result;
use colored::Colorize;
use predictor_lib::energy::{EnergySampler, RaplCounter, ShellWorkload};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tabled::Tabled;

use crate::output::{
    format_microjoules, format_watts, print_json, print_table, print_warning, OutputFormat,
};
use crate::structured_logger;

/// Row for the energy statistics table
#[derive(Tabled, Serialize)]
struct StatRow {
    #[tabled(rename = "Statistic")]
    statistic: &'static str,
    #[tabled(rename = "Energy (Package)")]
    energy: String,
    #[tabled(rename = "Power (Package)")]
    power: String,
}

/// Run `command` repeatedly and report package energy statistics
pub async fn measure(
    command: &str,
    runs: usize,
    timeout: Option<u64>,
    powercap_root: PathBuf,
    format: OutputFormat,
) -> Result<()> {
    let counter = RaplCounter::with_root(&powercap_root);
    if !counter.is_available().await {
        print_warning(&format!(
            "No RAPL package domains under {}; every run will be discarded",
            powercap_root.display()
        ));
    }

    let mut workload = ShellWorkload::new(command);
    if let Some(secs) = timeout {
        workload = workload.with_timeout(Duration::from_secs(secs));
    }

    let mut sampler = EnergySampler::new(counter, structured_logger());
    let stats = sampler.measure(&workload, runs).await?;

    match format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Table => {
            println!(
                "{} ({} of {} runs successful)",
                "RAPL Energy Analysis Results".bold(),
                stats.successful_runs.to_string().green(),
                runs
            );
            let rows = vec![
                StatRow {
                    statistic: "Average",
                    energy: format_microjoules(stats.avg_energy_uj),
                    power: format_watts(stats.avg_power_w),
                },
                StatRow {
                    statistic: "Min",
                    energy: format_microjoules(stats.min_energy_uj),
                    power: format_watts(stats.min_power_w),
                },
                StatRow {
                    statistic: "Max",
                    energy: format_microjoules(stats.max_energy_uj),
                    power: format_watts(stats.max_power_w),
                },
            ];
            print_table(&rows, format);
        }
    }
    Ok(())
}
