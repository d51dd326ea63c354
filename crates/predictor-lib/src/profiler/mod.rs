//! External profiler collaboration
//!
//! A [`ProfilerTool`] starts a microarchitecture collection against an
//! application, stops it and exports a per-function report. The
//! [`ProfilingSession`] drives one collection end to end, polling for the
//! tool's on-disk artifacts instead of sleeping for fixed intervals.

mod readiness;
mod vtune;

pub use readiness::{file_ready, result_finalized, wait_until};
pub use vtune::{default_vtune_path, VtuneCli};

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{info, warn};

/// What to profile and where the tool should store its results
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub app: PathBuf,
    pub working_dir: PathBuf,
    pub result_dir: PathBuf,
}

impl CollectionRequest {
    /// Working directory defaults to the application's parent directory
    pub fn new(app: impl Into<PathBuf>, result_dir: impl Into<PathBuf>) -> Self {
        let app = app.into();
        let working_dir = app
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            app,
            working_dir,
            result_dir: result_dir.into(),
        }
    }
}

/// A running (or already finished) collection
pub struct Collection {
    child: Option<Child>,
}

impl Collection {
    pub fn spawned(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Collection with no process to wait on
    pub fn finished() -> Self {
        Self { child: None }
    }

    /// Wait for the collector process to exit
    pub async fn wait(&mut self) -> Result<()> {
        if let Some(child) = self.child.as_mut() {
            let status = child.wait().await.context("Failed to wait for collector")?;
            info!(status = %status, "Collector exited");
            self.child = None;
        }
        Ok(())
    }

    /// Wait at most `limit`; returns whether the collector has exited
    pub async fn wait_for(&mut self, limit: Duration) -> Result<bool> {
        let Some(child) = self.child.as_mut() else {
            return Ok(true);
        };
        match timeout(limit, child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to wait for collector")?;
                info!(status = %status, "Collector exited");
                self.child = None;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    pub async fn kill(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            child.kill().await.context("Failed to kill collector")?;
        }
        Ok(())
    }
}

/// Trait for external profiling tools
#[async_trait]
pub trait ProfilerTool: Send + Sync {
    /// Fail early when the tool cannot be run at all
    async fn ensure_available(&self) -> Result<()>;

    async fn start_collection(&self, request: &CollectionRequest) -> Result<Collection>;

    async fn stop_collection(&self, result_dir: &Path) -> Result<()>;

    /// Export the per-function report as tab-delimited text
    async fn export_report(&self, result_dir: &Path, report: &Path) -> Result<()>;
}

/// Timing knobs for a profiling session
#[derive(Debug, Clone)]
pub struct SessionTiming {
    /// How long an interactive application is profiled before stopping
    pub collection_window: Duration,
    /// Upper bound for each readiness wait
    pub finalize_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            collection_window: Duration::from_secs(120),
            finalize_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Drives one collect/stop/export cycle against a profiler tool
pub struct ProfilingSession<'a, T: ProfilerTool + ?Sized> {
    tool: &'a T,
    timing: SessionTiming,
}

impl<'a, T: ProfilerTool + ?Sized> ProfilingSession<'a, T> {
    pub fn new(tool: &'a T, timing: SessionTiming) -> Self {
        Self { tool, timing }
    }

    /// Profile the application and export its report to `report`
    ///
    /// Headless applications are profiled until they exit; interactive
    /// ones for the collection window, after which the tool is told to
    /// stop.
    pub async fn run(&self, request: &CollectionRequest, headless: bool, report: &Path) -> Result<()> {
        self.tool.ensure_available().await?;

        if request.result_dir.exists() {
            info!(result_dir = %request.result_dir.display(), "Removing old result directory");
            tokio::fs::remove_dir_all(&request.result_dir)
                .await
                .with_context(|| format!("Failed to remove {}", request.result_dir.display()))?;
        }

        info!(app = %request.app.display(), headless, "Profiling started");
        let mut collection = self.tool.start_collection(request).await?;

        if headless {
            collection.wait().await?;
        } else if !collection.wait_for(self.timing.collection_window).await? {
            info!("Collection window elapsed, stopping profiler");
            self.tool.stop_collection(&request.result_dir).await?;
            if !collection.wait_for(self.timing.finalize_timeout).await? {
                warn!("Collector still running after stop, killing it");
                collection.kill().await?;
            }
        }

        wait_until(
            "finalized profiler result",
            self.timing.finalize_timeout,
            self.timing.poll_interval,
            || result_finalized(&request.result_dir),
        )
        .await?;

        info!(report = %report.display(), "Exporting report");
        self.tool.export_report(&request.result_dir, report).await?;

        wait_until(
            "exported report",
            self.timing.finalize_timeout,
            self.timing.poll_interval,
            || file_ready(report),
        )
        .await?;

        info!(report = %report.display(), "Report generated");
        Ok(())
    }
}
