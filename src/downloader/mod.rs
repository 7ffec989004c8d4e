//! Core downloader implementation split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`jobs`] - Admission control and download job execution
//! - [`lifecycle`] - Artifact deletion, on-demand sweeps and shutdown
//! - [`services`] - Background service starters (sweep task, API server)

mod jobs;
mod lifecycle;
mod services;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::environment::{EnvironmentKind, InvocationStrategy, select_strategy};
use crate::error::{Error, Result};
use crate::resolver::OutputResolver;
use crate::runner::{JobRunner, ProcessJobRunner};
use crate::types::{Event, JobInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};

/// Buffer size of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Admission gate and in-flight job bookkeeping
#[derive(Clone)]
pub(crate) struct AdmissionState {
    /// Limits running external processes (respects max_concurrent_jobs)
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Jobs admitted and not yet finished (queued + running + resolving)
    pub(crate) in_flight: Arc<AtomicUsize>,
    /// Maximum value of `in_flight`
    pub(crate) capacity: usize,
    /// In-flight jobs keyed by id, for `GET /jobs`
    pub(crate) jobs: Arc<std::sync::Mutex<HashMap<String, JobInfo>>>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl AdmissionState {
    fn new(max_concurrent: usize, max_queued: usize) -> Self {
        Self {
            concurrent_limit: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            capacity: max_concurrent.saturating_add(max_queued),
            jobs: Arc::new(std::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// How the extraction tool is invoked on this host
    pub(crate) strategy: Arc<dyn InvocationStrategy>,
    /// Executes invocation plans
    pub(crate) runner: Arc<dyn JobRunner>,
    /// Locates produced files
    pub(crate) resolver: OutputResolver,
    /// Admission gate and in-flight jobs
    pub(crate) admission: AdmissionState,
    /// Cancels the background sweep task
    pub(crate) sweep_cancel: tokio_util::sync::CancellationToken,
}

impl MediaDownloader {
    /// Create a downloader for the detected (or configured) host environment
    ///
    /// Validates the configuration, creates the output directory and selects the
    /// invocation strategy. The sweep task is not started; see
    /// [`start_sweeper`](Self::start_sweeper).
    pub async fn new(config: Config) -> Result<Self> {
        let strategy = select_strategy(&config);
        Self::with_components(config, strategy, Arc::new(ProcessJobRunner::new())).await
    }

    /// Create a downloader with an explicit strategy and runner
    pub async fn with_components(
        config: Config,
        strategy: Arc<dyn InvocationStrategy>,
        runner: Arc<dyn JobRunner>,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.output_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create output directory '{}': {}",
                        config.output_dir().display(),
                        e
                    ),
                ))
            })?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let resolver = OutputResolver::new(config.download.resolver.recency_window);
        let admission = AdmissionState::new(
            config.download.max_concurrent_jobs,
            config.download.max_queued_jobs,
        );

        tracing::info!(
            environment = strategy.kind().as_str(),
            runner = runner.name(),
            output_dir = ?config.output_dir(),
            isolate_jobs = config.download.isolate_jobs,
            max_concurrent_jobs = config.download.max_concurrent_jobs,
            "media downloader initialized"
        );

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            strategy,
            runner,
            resolver,
            admission,
            sweep_cancel: tokio_util::sync::CancellationToken::new(),
        })
    }

    /// Subscribe to downloader events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events, it receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Environment the invocation strategy targets
    pub fn environment(&self) -> EnvironmentKind {
        self.strategy.kind()
    }

    /// Whether new jobs are admitted
    pub fn is_accepting(&self) -> bool {
        self.admission
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
