//! CPU identity detection
//!
//! The brand string only feeds the hybrid-processor check, so failing to
//! read it is never fatal for callers; they fall back to an empty brand.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Source of the processor brand string
pub struct CpuIdentity {
    proc_path: PathBuf,
}

impl CpuIdentity {
    pub fn new() -> Self {
        Self {
            proc_path: PathBuf::from("/proc"),
        }
    }

    /// Create identity reader with custom proc path (for testing)
    pub fn with_proc_path(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
        }
    }

    /// Read the `model name` of the first processor in cpuinfo
    pub async fn brand(&self) -> Result<String> {
        read_cpu_brand(&self.proc_path).await
    }

    /// Brand string, or empty when it cannot be determined
    pub async fn brand_or_default(&self) -> String {
        match self.brand().await {
            Ok(brand) => brand,
            Err(e) => {
                warn!(error = %e, "Could not determine CPU brand, assuming non-hybrid");
                String::new()
            }
        }
    }
}

impl Default for CpuIdentity {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn read_cpu_brand(proc_path: &Path) -> Result<String> {
    let cpuinfo = proc_path.join("cpuinfo");
    let content = fs::read_to_string(&cpuinfo)
        .await
        .with_context(|| format!("Failed to read {}", cpuinfo.display()))?;
    parse_cpu_brand(&content).context("No model name in cpuinfo")
}

/// Parse the first `model name` entry of cpuinfo contents
pub fn parse_cpu_brand(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}
