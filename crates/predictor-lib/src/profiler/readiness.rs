//! Polling readiness checks with timeout

use crate::error::PowerError;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Poll `check` until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(
    what: &str,
    timeout: Duration,
    poll_interval: Duration,
    mut check: F,
) -> Result<(), PowerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if check().await {
            debug!(what, elapsed_ms = start.elapsed().as_millis(), "Ready");
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(PowerError::NotReady {
                what: what.to_string(),
                waited: timeout,
            });
        }
        sleep(poll_interval).await;
    }
}

/// True once the result directory holds a finalized `*.vtune` result file
pub async fn result_finalized(result_dir: &Path) -> bool {
    let Ok(mut entries) = fs::read_dir(result_dir).await else {
        return false;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.path().extension().is_some_and(|ext| ext == "vtune") {
            return true;
        }
    }
    false
}

/// True once the file exists and is non-empty
pub async fn file_ready(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
