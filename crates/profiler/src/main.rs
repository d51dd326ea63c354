//! CPU Profiler - power prediction from microarchitecture profiles
//!
//! Profiles an application with VTune (or takes an already converted
//! report), predicts its min/avg/peak power with the ONNX models,
//! optionally measures its package energy through RAPL and writes the
//! combined `full_results.csv` record.

use anyhow::{Context, Result};
use clap::Parser;
use predictor_lib::{
    cpu::CpuIdentity,
    energy::{format_microjoules, EnergySampler, RaplCounter, ShellWorkload},
    pipeline::{write_run_record, PowerPipeline, FULL_RESULTS_FILE},
    predictor::{ModelDirectory, PowerPredictor},
    profiler::{CollectionRequest, ProfilingSession, VtuneCli},
    EnergyStats, PipelineMetrics, PowerError, PredictionMode, RunRecord, StructuredLogger,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const PROFILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Raw profiler export inside the output directory
const RAW_REPORT_FILE: &str = "vtune_report_raw.csv";

/// Canonical per-function CSV produced from the raw export
const CONVERTED_REPORT_FILE: &str = "transformed_vtune_output.csv";

/// CPU power profiler
#[derive(Parser)]
#[command(name = "cpu-profiler")]
#[command(author, version, about = "CPU Profiler Tool: predict application power from VTune metrics", long_about = None)]
struct Args {
    /// Power prediction mode (avg, min, peak, all)
    #[arg(long, short)]
    mode: PredictionMode,

    /// Path to application executable for profiling
    #[arg(long, short)]
    app: Option<PathBuf>,

    /// Converted CSV file for power prediction
    #[arg(long, short)]
    csv: Option<PathBuf>,

    /// Profile a CLI application until it exits
    #[arg(long)]
    headless: bool,

    /// Directory for profiler results and generated CSVs
    #[arg(long, short, default_value = "vtune_results_uarch")]
    output_dir: PathBuf,

    /// Measure package energy of the application with RAPL
    #[arg(long)]
    rapl: bool,

    /// Number of RAPL measurement runs
    #[arg(long)]
    runs: Option<usize>,

    /// Per-run workload timeout in seconds
    #[arg(long)]
    workload_timeout: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Override the detected CPU brand string
    #[arg(long)]
    cpu_brand: Option<String>,

    /// Directory holding the ONNX power models
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// VTune executable
    #[arg(long)]
    vtune: Option<PathBuf>,

    /// Configuration file (defaults to ./cpu-profiler.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write Prometheus metrics to this file on exit
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs);

    let mut config = config::ProfilerConfig::load(args.config.as_deref())?;
    if let Some(dir) = &args.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(vtune) = &args.vtune {
        config.vtune_path = vtune.clone();
    }
    if let Some(runs) = args.runs {
        config.energy_runs = runs;
    }
    if args.workload_timeout.is_some() {
        config.workload_timeout_secs = args.workload_timeout;
    }
    if args.rapl && args.app.is_none() {
        anyhow::bail!("--rapl requires --app");
    }

    let cpu_brand = match &args.cpu_brand {
        Some(brand) => brand.clone(),
        None => CpuIdentity::new().brand_or_default().await,
    };

    let logger = StructuredLogger::new(&config.host);
    logger.log_startup(PROFILER_VERSION, &cpu_brand);
    info!(model_dir = %config.model_dir.display(), mode = %args.mode, "Profiler configured");

    let metrics = PipelineMetrics::new();
    let result = run(&args, &config, &cpu_brand, logger).await;

    if let Some(path) = &args.metrics_file {
        metrics
            .write_to(path)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }
    result
}

async fn run(
    args: &Args,
    config: &config::ProfilerConfig,
    cpu_brand: &str,
    logger: StructuredLogger,
) -> Result<()> {
    let predictor = PowerPredictor::new(ModelDirectory::new(&config.model_dir));
    let pipeline = PowerPipeline::new(predictor, cpu_brand, logger.clone());

    let prediction = if let Some(app) = &args.app {
        let converted = profile_and_convert(&pipeline, args, config, app).await?;
        pipeline.predict_csv(&converted, args.mode)?
    } else {
        let csv = args
            .csv
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONVERTED_REPORT_FILE));
        pipeline.predict_csv(&csv, args.mode)?
    };
    info!(?prediction, "Prediction results");

    let energy = match (&args.app, args.rapl) {
        (Some(app), true) => measure_energy(app, config, logger).await?,
        _ => None,
    };
    if let Some(stats) = &energy {
        println!("\n{}", energy_summary(stats));
    }

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let app_command = args.app.as_ref().map(|app| app.display().to_string());
    let record = RunRecord::new(Some(&prediction), energy.as_ref(), app_command.as_deref());
    write_run_record(&args.output_dir.join(FULL_RESULTS_FILE), &record)?;
    Ok(())
}

/// Collect a profile of `app` and convert its report; returns the converted CSV
async fn profile_and_convert(
    pipeline: &PowerPipeline<ModelDirectory>,
    args: &Args,
    config: &config::ProfilerConfig,
    app: &Path,
) -> Result<PathBuf> {
    let app = absolutize(app)?;
    let result_dir = absolutize(&args.output_dir)?;
    let report = result_dir.join(RAW_REPORT_FILE);
    let converted = result_dir.join(CONVERTED_REPORT_FILE);

    let tool = VtuneCli::new(&config.vtune_path);
    let request = CollectionRequest::new(app, &result_dir);
    ProfilingSession::new(&tool, config.timing())
        .run(&request, args.headless, &report)
        .await?;

    pipeline.convert_report(&report, &converted)?;
    Ok(converted)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

/// RAPL session over the application; `None` when no run produced a reading
async fn measure_energy(
    app: &Path,
    config: &config::ProfilerConfig,
    logger: StructuredLogger,
) -> Result<Option<EnergyStats>> {
    let counter = RaplCounter::with_root(&config.powercap_root);
    if !counter.is_available().await {
        warn!(root = %config.powercap_root.display(), "No RAPL package domains found");
    }

    let mut workload = ShellWorkload::new(app.display().to_string());
    if let Some(timeout) = config.workload_timeout() {
        workload = workload.with_timeout(timeout);
    }

    let mut sampler = EnergySampler::new(counter, logger);
    match sampler.measure(&workload, config.energy_runs).await {
        Ok(stats) => Ok(Some(stats)),
        Err(e) => match e.downcast_ref::<PowerError>() {
            Some(PowerError::AllTrialsFailed { .. }) => {
                warn!(error = %e, "RAPL energy measurement produced no results");
                Ok(None)
            }
            _ => Err(e),
        },
    }
}

fn energy_summary(stats: &EnergyStats) -> String {
    let lines = [
        "--- RAPL Energy Analysis Results ---".to_string(),
        format!("Statistics from {} successful runs:", stats.successful_runs),
        "  Energy (Package):".to_string(),
        format!("    - Average: {}", format_microjoules(stats.avg_energy_uj)),
        format!("    - Min:     {}", format_microjoules(stats.min_energy_uj)),
        format!("    - Max:     {}", format_microjoules(stats.max_energy_uj)),
        "  Power (Package):".to_string(),
        format!("    - Average: {:.2} W", stats.avg_power_w),
        format!("    - Min:     {:.2} W", stats.min_power_w),
        format!("    - Max:     {:.2} W", stats.max_power_w),
        "------------------------------------".to_string(),
    ];
    lines.join("\n")
}
