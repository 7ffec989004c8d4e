//! Artifact deletion, on-demand sweeps, and shutdown coordination.

use crate::artifacts::{SweepReport, delete_by_name, sweep_expired};
use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::MediaDownloader;

/// How long shutdown waits for running jobs
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MediaDownloader {
    /// Delete a produced file from the shared output directory
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFileName`](crate::Error::InvalidFileName) for names containing
    ///   `..`, `/` or `\` (the filesystem is not touched)
    /// - [`Error::NotFound`](crate::Error::NotFound) if no such file exists
    /// - [`Error::Lifecycle`](crate::Error::Lifecycle) if removal fails
    pub async fn delete_artifact(&self, file_name: &str) -> Result<()> {
        delete_by_name(self.config.output_dir(), file_name).await?;
        self.emit_event(Event::ArtifactDeleted {
            file_name: file_name.to_string(),
        });
        Ok(())
    }

    /// Run one expiry sweep now with the configured maximum age
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        let report = sweep_expired(self.config.output_dir(), self.config.lifecycle.max_age).await?;
        self.emit_event(Event::SweepCompleted {
            deleted: report.deleted.len(),
            failed: report.failed.len(),
        });
        Ok(report)
    }

    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new jobs
    /// 2. Cancels the sweep task
    /// 3. Waits up to 30 seconds for in-flight jobs to finish
    /// 4. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.admission.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.sweep_cancel.cancel();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_in_flight()).await {
            Ok(()) => tracing::info!("All in-flight jobs completed"),
            Err(_) => tracing::warn!(
                in_flight = self.in_flight(),
                "Timeout waiting for jobs to complete, proceeding with shutdown"
            ),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_in_flight(&self) {
        loop {
            let in_flight = self.in_flight();
            if in_flight == 0 {
                return;
            }
            tracing::debug!(in_flight, "Waiting for in-flight jobs to complete");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
