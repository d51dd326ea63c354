//! Power Predict CLI
//!
//! A command-line tool for converting profiler reports, predicting CPU
//! power from them and measuring workload energy with RAPL.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{convert, energy, predict};
use predictor_lib::{cpu::CpuIdentity, energy::DEFAULT_POWERCAP_ROOT, PredictionMode, StructuredLogger};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CPU Power Predictor CLI
#[derive(Parser)]
#[command(name = "power-predict")]
#[command(author, version, about = "CLI for CPU Power Predictor", long_about = None)]
pub struct Cli {
    /// Output format (defaults to the config file value, then table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Override the detected CPU brand string
    #[arg(long, global = true, env = "POWER_PREDICT_CPU_BRAND")]
    pub cpu_brand: Option<String>,

    /// Log level for diagnostics on stderr
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict power from a converted CSV
    Predict {
        /// Converted CSV (or raw report with --raw)
        file: PathBuf,

        /// Prediction mode (avg, min, peak, all)
        #[arg(long, short, default_value = "all")]
        mode: PredictionMode,

        /// Input is a raw tab-delimited profiler export
        #[arg(long)]
        raw: bool,

        /// Directory holding the ONNX power models
        #[arg(long, env = "POWER_PREDICT_MODEL_DIR")]
        model_dir: Option<PathBuf>,
    },

    /// Show the normalized feature vector of a report
    Features {
        file: PathBuf,

        /// Input is a raw tab-delimited profiler export
        #[arg(long)]
        raw: bool,
    },

    /// Convert a raw profiler report to the canonical CSV
    Convert {
        /// Tab-delimited profiler report
        report: PathBuf,

        /// Output CSV path
        #[arg(long, short, default_value = "transformed_vtune_output.csv")]
        output: PathBuf,
    },

    /// Aggregate a directory of converted CSVs, one row per file
    Aggregate {
        dir: PathBuf,

        /// Write the aggregates as CSV instead of printing them
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Measure package energy of a command with RAPL
    Energy {
        /// Shell command to run
        command: String,

        /// Number of measurement runs
        #[arg(long, short, default_value_t = predictor_lib::energy::DEFAULT_RUNS)]
        runs: usize,

        /// Per-run timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Powercap sysfs root
        #[arg(long, default_value = DEFAULT_POWERCAP_ROOT)]
        powercap_root: PathBuf,
    },
}

/// Logger tagged with this machine's host name
pub(crate) fn structured_logger() -> StructuredLogger {
    StructuredLogger::new(std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string()))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        let message = format!("{e:#}");
        error!(error = %message, "Command failed");
        output::print_error(&message);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(output::OutputFormat::from_config)
        })
        .unwrap_or_default();

    let cpu_brand = match cli.cpu_brand {
        Some(brand) => brand,
        None => CpuIdentity::new().brand_or_default().await,
    };

    match cli.command {
        Commands::Predict {
            file,
            mode,
            raw,
            model_dir,
        } => {
            let model_dir = model_dir
                .or(config.model_dir)
                .unwrap_or_else(|| PathBuf::from("models"));
            predict::predict(&file, mode, raw, model_dir, &cpu_brand, format)?;
        }
        Commands::Features { file, raw } => {
            predict::features(&file, raw, &cpu_brand, format)?;
        }
        Commands::Convert { report, output } => {
            convert::convert(&report, &output, &cpu_brand, format)?;
        }
        Commands::Aggregate { dir, output } => {
            convert::aggregate(&dir, output.as_deref(), &cpu_brand, format)?;
        }
        Commands::Energy {
            command,
            runs,
            timeout,
            powercap_root,
        } => {
            energy::measure(&command, runs, timeout, powercap_root, format).await?;
        }
    }

    Ok(())
}
