//! Workload execution under measurement

use super::{Workload, WorkloadOutcome};
use crate::error::PowerError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// A command line run through the platform shell
///
/// Output is captured and discarded. Without a timeout a hung command
/// blocks the session indefinitely.
#[derive(Debug, Clone)]
pub struct ShellWorkload {
    command: String,
    timeout: Option<Duration>,
}

impl ShellWorkload {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Kill the workload and fail the session if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn shell_command(&self) -> Command {
        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&self.command);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.command);
            cmd
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Workload for ShellWorkload {
    async fn run(&self) -> Result<WorkloadOutcome> {
        let mut cmd = self.shell_command();
        let output = cmd.output();
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, output)
                .await
                .map_err(|_| PowerError::WorkloadTimeout { timeout })?,
            None => output.await,
        }
        .with_context(|| format!("Failed to run workload '{}'", self.command))?;

        debug!(
            command = %self.command,
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Workload finished"
        );

        if output.status.success() {
            Ok(WorkloadOutcome::Completed)
        } else {
            Ok(WorkloadOutcome::Failed(format!(
                "workload exited with {}",
                output.status
            )))
        }
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}
