//! Intel VTune command-line driver

use super::{Collection, CollectionRequest, ProfilerTool};
use crate::error::PowerError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

#[cfg(windows)]
const DEFAULT_VTUNE_PATH: &str = r"C:\Program Files (x86)\Intel\oneAPI\vtune\2024.1\bin64\vtune.exe";
#[cfg(not(windows))]
const DEFAULT_VTUNE_PATH: &str = "/opt/intel/oneapi/vtune/2025.4/bin64/vtune";

/// Install location of the VTune CLI for this platform
pub fn default_vtune_path() -> PathBuf {
    PathBuf::from(DEFAULT_VTUNE_PATH)
}

/// [`ProfilerTool`] backed by the `vtune` executable
#[derive(Debug, Clone)]
pub struct VtuneCli {
    executable: PathBuf,
}

impl VtuneCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn collect_args(request: &CollectionRequest) -> Vec<OsString> {
        vec![
            "-collect".into(),
            "uarch-exploration".into(),
            "-result-dir".into(),
            request.result_dir.clone().into(),
            "-follow-child".into(),
            "-app-working-dir".into(),
            request.working_dir.clone().into(),
            "--".into(),
            request.app.clone().into(),
        ]
    }

    fn stop_args(result_dir: &Path) -> Vec<OsString> {
        vec![
            "-r".into(),
            result_dir.into(),
            "-command".into(),
            "stop".into(),
        ]
    }

    fn report_args(result_dir: &Path, report: &Path) -> Vec<OsString> {
        vec![
            "-report".into(),
            "hotspots".into(),
            "-result-dir".into(),
            result_dir.into(),
            "-group-by".into(),
            "function".into(),
            "-format".into(),
            "csv".into(),
            "-report-output".into(),
            report.into(),
        ]
    }

    /// Run a short-lived vtune command and require success
    async fn run_checked(&self, args: Vec<OsString>, action: &str) -> Result<()> {
        debug!(executable = %self.executable.display(), ?args, "Running vtune");
        let status = Command::new(&self.executable)
            .args(&args)
            .status()
            .await
            .with_context(|| format!("Failed to run vtune {action}"))?;
        if !status.success() {
            anyhow::bail!("vtune {} failed with {}", action, status);
        }
        Ok(())
    }
}

impl Default for VtuneCli {
    fn default() -> Self {
        Self::new(default_vtune_path())
    }
}

#[async_trait]
impl ProfilerTool for VtuneCli {
    async fn ensure_available(&self) -> Result<()> {
        if tokio::fs::metadata(&self.executable).await.is_err() {
            return Err(PowerError::ToolUnavailable(self.executable.clone()).into());
        }
        Ok(())
    }

    async fn start_collection(&self, request: &CollectionRequest) -> Result<Collection> {
        let child = Command::new(&self.executable)
            .args(Self::collect_args(request))
            .kill_on_drop(true)
            .spawn()
            .context("Failed to start vtune collection")?;
        Ok(Collection::spawned(child))
    }

    async fn stop_collection(&self, result_dir: &Path) -> Result<()> {
        self.run_checked(Self::stop_args(result_dir), "stop").await
    }

    async fn export_report(&self, result_dir: &Path, report: &Path) -> Result<()> {
        self.run_checked(Self::report_args(result_dir, report), "report").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let tool = VtuneCli::new(temp_dir.path().join("vtune"));

        let err = tool.ensure_available().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PowerError>(),
            Some(PowerError::ToolUnavailable(path)) if path.ends_with("vtune")
        ));
    }

    #[test]
    fn test_collect_arguments() {
        let request = CollectionRequest {
            app: PathBuf::from("/opt/app/bench"),
            working_dir: PathBuf::from("/opt/app"),
            result_dir: PathBuf::from("/tmp/results"),
        };
        let args = VtuneCli::collect_args(&request);
        let args: Vec<&str> = args.iter().filter_map(|a| a.to_str()).collect();
        assert_eq!(
            args,
            vec![
                "-collect",
                "uarch-exploration",
                "-result-dir",
                "/tmp/results",
                "-follow-child",
                "-app-working-dir",
                "/opt/app",
                "--",
                "/opt/app/bench",
            ]
        );
    }

    #[test]
    fn test_report_arguments() {
        let args = VtuneCli::report_args(Path::new("res"), Path::new("out.csv"));
        let args: Vec<&str> = args.iter().filter_map(|a| a.to_str()).collect();
        assert_eq!(
            args,
            vec![
                "-report",
                "hotspots",
                "-result-dir",
                "res",
                "-group-by",
                "function",
                "-format",
                "csv",
                "-report-output",
                "out.csv",
            ]
        );
        assert_eq!(VtuneCli::stop_args(Path::new("res")).len(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        // `false` ignores its arguments and exits 1
        let tool = VtuneCli::new("false");
        let err = tool.stop_collection(Path::new("res")).await.unwrap_err();
        assert!(err.to_string().contains("vtune stop failed"));
    }
}
