//! Background expiry sweep
//!
//! Runs [`sweep_expired`](crate::artifacts::sweep_expired) once at startup (unless
//! disabled) and then on a fixed interval until its [`CancellationToken`] is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use media_dl::config::LifecycleConfig;
//! use media_dl::sweep_task::SweepTask;
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let cancel = CancellationToken::new();
//! let task = SweepTask::new(
//!     PathBuf::from("./public/downloads"),
//!     LifecycleConfig::default(),
//!     None,
//!     cancel.clone(),
//! );
//! let handle = tokio::spawn(task.run());
//!
//! cancel.cancel();
//! handle.await.ok();
//! # }
//! ```

use crate::artifacts::sweep_expired;
use crate::config::LifecycleConfig;
use crate::types::Event;
use std::path::PathBuf;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owned background task that expires old artifacts
pub struct SweepTask {
    output_dir: PathBuf,
    config: LifecycleConfig,
    event_tx: Option<broadcast::Sender<Event>>,
    cancel: CancellationToken,
}

impl SweepTask {
    /// Create a sweep task
    ///
    /// `event_tx`, when given, receives a [`Event::SweepCompleted`] after every sweep.
    pub fn new(
        output_dir: PathBuf,
        config: LifecycleConfig,
        event_tx: Option<broadcast::Sender<Event>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            output_dir,
            config,
            event_tx,
            cancel,
        }
    }

    /// Run until cancelled
    pub async fn run(self) {
        info!(
            dir = ?self.output_dir,
            max_age_secs = self.config.max_age.as_secs(),
            interval_secs = self.config.sweep_interval.as_secs(),
            "sweep task started"
        );

        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick completes immediately
        if !self.config.sweep_on_startup {
            interval.tick().await;
        }

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                _ = self.cancel.cancelled() => {
                    break;
                }
            }
        }

        info!("sweep task stopped");
    }

    async fn sweep_once(&self) {
        debug!(dir = ?self.output_dir, "running expiry sweep");
        match sweep_expired(&self.output_dir, self.config.max_age).await {
            Ok(report) => {
                if let Some(tx) = &self.event_tx {
                    tx.send(Event::SweepCompleted {
                        deleted: report.deleted.len(),
                        failed: report.failed.len(),
                    })
                    .ok();
                }
            }
            Err(e) => {
                warn!(dir = ?self.output_dir, error = %e, "expiry sweep failed");
            }
        }
    }
}
