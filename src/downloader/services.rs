//! Background service starters - expiry sweep and REST API server.

use crate::error::Result;
use crate::sweep_task::SweepTask;

use super::MediaDownloader;

impl MediaDownloader {
    /// Start the expiry sweep background task
    ///
    /// The task runs until [`shutdown`](Self::shutdown) cancels it.
    pub fn start_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let task = SweepTask::new(
            self.config.output_dir().clone(),
            self.config.lifecycle.clone(),
            Some(self.event_tx.clone()),
            self.sweep_cancel.child_token(),
        );

        let handle = tokio::spawn(async move {
            task.run().await;
        });

        tracing::info!("Sweep task started");

        handle
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on the configured bind address (default: 127.0.0.1:4001).
    pub fn spawn_api_server(self: &std::sync::Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
