//! # media-dl
//!
//! Downloads media through an external extraction tool (yt-dlp) and serves the
//! produced files from a shared output directory.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Environment-aware** - The tool invocation adapts to native POSIX hosts,
//!   Linux compatibility layers on Windows and native Windows
//! - **Tolerant of the tool** - The produced file is found even when the tool does
//!   not report it, by a ladder of progressively looser matches
//! - **Self-cleaning** - Files past their maximum age are swept in the background
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadRequest, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let artifact = downloader
//!         .download(DownloadRequest::new("https://youtu.be/dQw4w9WgXcQ", "audio"))
//!         .await?;
//!     println!("served at {}", artifact.file_path);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Produced file lifecycle: deletion, expiry sweep, promotion
pub mod artifacts;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Host environment detection and tool invocation strategies
pub mod environment;
/// Error types
pub mod error;
/// Format id catalog and selector mapping
pub mod format;
/// Locating the file a finished job produced
pub mod resolver;
/// External process execution
pub mod runner;
/// Candidate output file names
pub mod stem;
/// Background expiry sweep
pub mod sweep_task;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use downloader::MediaDownloader;
pub use environment::{EnvironmentKind, InvocationStrategy};
pub use error::{ApiError, Error, LifecycleError, ProcessError, Result, ToHttpStatus};
pub use format::FormatId;
pub use resolver::{OutputResolver, ResolutionTier};
pub use runner::{JobRunner, ProcessJobRunner};
pub use types::{
    DownloadRequest, Event, InvocationPlan, JobInfo, JobResult, JobState, ResolvedArtifact,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{MediaDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let downloader = MediaDownloader::new(config).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

/// Resolve once the process receives a termination signal
pub async fn wait_for_signal() {
    platform_signal().await;
}

#[cfg(unix)]
async fn platform_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for SIGINT only"
            );
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGINT handler, waiting for SIGTERM only"
            );
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn platform_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
