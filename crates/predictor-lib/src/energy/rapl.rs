//! RAPL package energy counter
//!
//! Reads the Linux powercap interface:
//! - intel-rapl:<n>/name identifies the domain ("package-<n>")
//! - intel-rapl:<n>/energy_uj is the cumulative energy in microjoules
//! - intel-rapl:<n>/max_energy_range_uj is the wraparound point

use super::{CounterReading, EnergyCounter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::{debug, warn};

/// Default powercap sysfs root
pub const DEFAULT_POWERCAP_ROOT: &str = "/sys/class/powercap";

/// One package-level RAPL domain (one per socket)
#[derive(Debug, Clone, PartialEq)]
pub struct RaplDomain {
    pub name: String,
    pub path: PathBuf,
    pub max_energy_range_uj: Option<u64>,
}

/// Package energy counter backed by powercap sysfs
pub struct RaplCounter {
    root: PathBuf,
    domains: Option<Vec<RaplDomain>>,
    window: Option<(Instant, Vec<u64>)>,
}

impl RaplCounter {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_POWERCAP_ROOT)
    }

    /// Create counter with a custom powercap root (for testing)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            domains: None,
            window: None,
        }
    }

    /// Check if any package domain is exposed on this system
    pub async fn is_available(&self) -> bool {
        discover_domains(&self.root)
            .await
            .map(|d| !d.is_empty())
            .unwrap_or(false)
    }

    async fn domains(&mut self) -> Result<&[RaplDomain]> {
        if self.domains.is_none() {
            let domains = discover_domains(&self.root).await?;
            debug!(count = domains.len(), root = %self.root.display(), "Discovered RAPL package domains");
            self.domains = Some(domains);
        }
        Ok(self.domains.as_deref().unwrap_or_default())
    }

    async fn read_all(&mut self) -> Result<Vec<u64>> {
        let paths: Vec<PathBuf> = self.domains().await?.iter().map(|d| d.path.clone()).collect();
        let mut values = Vec::with_capacity(paths.len());
        for path in paths {
            values.push(read_energy_uj(&path).await?);
        }
        Ok(values)
    }
}

impl Default for RaplCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnergyCounter for RaplCounter {
    async fn begin(&mut self) -> Result<()> {
        let start = self.read_all().await?;
        self.window = Some((Instant::now(), start));
        Ok(())
    }

    async fn end(&mut self) -> Result<Option<CounterReading>> {
        let Some((started, start_values)) = self.window.take() else {
            anyhow::bail!("RAPL counter ended without begin");
        };
        let duration = started.elapsed();

        let end_values = match self.read_all().await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "Failed to read RAPL counters");
                return Ok(None);
            }
        };
        if start_values.is_empty() || start_values.len() != end_values.len() {
            return Ok(None);
        }

        let domains = self.domains().await?;
        let package_uj = domains
            .iter()
            .zip(start_values.iter().zip(end_values.iter()))
            .map(|(domain, (&start, &end))| energy_delta(start, end, domain.max_energy_range_uj) as f64)
            .collect();

        Ok(Some(CounterReading {
            package_uj,
            duration,
        }))
    }
}

/// Energy consumed between two counter values, accounting for wraparound
pub fn energy_delta(start: u64, end: u64, max_range: Option<u64>) -> u64 {
    if end >= start {
        end - start
    } else {
        match max_range {
            Some(max) => max.saturating_sub(start) + end,
            None => 0,
        }
    }
}

/// Find top-level package domains (`intel-rapl:<n>`, name `package-*`)
pub async fn discover_domains(root: &Path) -> Result<Vec<RaplDomain>> {
    let mut entries = fs::read_dir(root)
        .await
        .with_context(|| format!("Failed to read {}", root.display()))?;

    let mut domains = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        // Subzones look like intel-rapl:0:0
        if !dir_name.starts_with("intel-rapl:") || dir_name.matches(':').count() != 1 {
            continue;
        }

        let path = entry.path();
        let name = match fs::read_to_string(path.join("name")).await {
            Ok(name) => name.trim().to_string(),
            Err(_) => continue,
        };
        if !name.starts_with("package") {
            continue;
        }

        let max_energy_range_uj = fs::read_to_string(path.join("max_energy_range_uj"))
            .await
            .ok()
            .and_then(|s| s.trim().parse().ok());

        domains.push(RaplDomain {
            name,
            path,
            max_energy_range_uj,
        });
    }

    domains.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(domains)
}

async fn read_energy_uj(domain_path: &Path) -> Result<u64> {
    let file = domain_path.join("energy_uj");
    let content = fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    content
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", file.display()))
}
