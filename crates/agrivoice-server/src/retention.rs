//! Background task for enforcing artifact retention.

use agrivoice_pipeline::ArtifactStore;
use std::io;
use std::time::Duration;
use tokio::time::sleep;

/// Runs one sweep of both artifact directories off the async runtime.
pub async fn sweep_artifacts(store: ArtifactStore, retention: Duration) -> io::Result<usize> {
    tokio::task::spawn_blocking(move || store.sweep(retention))
        .await
        .map_err(|e| io::Error::other(format!("sweep task failed: {}", e)))?
}

/// Starts a background task that periodically deletes expired artifacts.
///
/// This task runs indefinitely. An interval of 0 disables it.
pub async fn start_cleanup_task(store: ArtifactStore, interval_seconds: u64, retention: Duration) {
    if interval_seconds == 0 {
        tracing::warn!("artifact cleanup task disabled (interval=0)");
        return;
    }

    let interval = Duration::from_secs(interval_seconds);
    tracing::info!(
        interval_seconds,
        retention_seconds = retention.as_secs(),
        "starting artifact cleanup task"
    );

    loop {
        sleep(interval).await;

        match sweep_artifacts(store.clone(), retention).await {
            Ok(count) if count > 0 => tracing::info!(count, "deleted expired artifacts"),
            Ok(_) => tracing::debug!("no expired artifacts to delete"),
            Err(e) => tracing::error!(error = %e, "failed to delete expired artifacts"),
        }
    }
}
