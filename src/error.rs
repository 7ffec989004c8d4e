//! Error types for media-dl
//!
//! This module provides the error taxonomy for the library:
//! - Domain-specific error types (process, lifecycle, validation)
//! - HTTP status code mapping for API integration
//! - Structured `{success: false, error}` responses with machine-readable codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Every public contract (download, delete, sweep) returns this type. Filesystem and
/// process failures are converted into a variant here and never escape as panics.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request fields
    #[error("validation error: {0}")]
    Validation(String),

    /// File name rejected before touching the filesystem
    #[error("invalid file name {name:?}: {reason}")]
    InvalidFileName {
        /// The rejected name
        name: String,
        /// Why the name was rejected
        reason: &'static str,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.output_dir")
        key: Option<String>,
    },

    /// The external extraction tool failed
    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    /// The tool reported success but no produced file could be located
    #[error("downloaded file not found for job {stem}")]
    ResolutionMiss {
        /// Candidate stem of the job whose output went missing
        stem: String,
    },

    /// Requested artifact does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Artifact lifecycle failure (delete, promote, sweep)
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Admission gate is saturated
    #[error("too many jobs in flight (limit {limit})")]
    QueueFull {
        /// Number of jobs that may be queued or running at once
        limit: usize,
    },

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

/// External process failures
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The child process could not be started
    #[error("failed to execute {executable}: {reason}")]
    SpawnFailed {
        /// Executable that was attempted
        executable: String,
        /// OS error description
        reason: String,
    },

    /// The child process exited unsuccessfully
    #[error("{executable} exited with {}: {stderr}", describe_exit(.exit_code))]
    NonZeroExit {
        /// Executable that was run
        executable: String,
        /// Exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
        /// Trailing stderr output of the process
        stderr: String,
    },
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// Artifact lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Deleting an artifact failed
    #[error("failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path that could not be deleted
        path: PathBuf,
        /// The reason deletion failed
        reason: String,
    },

    /// Moving a resolved file into the shared directory failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    PromoteFailed {
        /// Scratch location of the resolved file
        source_path: PathBuf,
        /// Destination inside the shared output directory
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// Listing the output directory failed
    #[error("failed to scan {path}: {reason}")]
    ScanFailed {
        /// Directory that could not be listed
        path: PathBuf,
        /// The reason the scan failed
        reason: String,
    },

    /// No unique destination name could be found
    #[error("no free file name for {path} after {attempts} attempts")]
    NameExhausted {
        /// Desired destination
        path: PathBuf,
        /// Number of candidate names tried
        attempts: u32,
    },
}

/// API error response format
///
/// Returned by every failing endpoint. `success` is always `false`; `error` carries the
/// human-readable message and `code` the machine-readable one.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "success": false,
///   "error": "not found: clip_1718000000000.mp4",
///   "code": "not_found"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always `false`
    pub success: bool,

    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - nothing was spawned or touched
            Error::Validation(_) => 400,
            Error::InvalidFileName { .. } => 400,
            Error::Config { .. } => 400,

            // 404 Not Found - the tool may have succeeded, but no file matched
            Error::ResolutionMiss { .. } => 404,
            Error::NotFound(_) => 404,

            // 500 Internal Server Error
            Error::Process(_) => 500,
            Error::Lifecycle(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,

            // 503 Service Unavailable
            Error::QueueFull { .. } => 503,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::InvalidFileName { .. } => "invalid_file_name",
            Error::Config { .. } => "config_error",
            Error::Process(e) => match e {
                ProcessError::SpawnFailed { .. } => "spawn_failed",
                ProcessError::NonZeroExit { .. } => "process_failed",
            },
            Error::ResolutionMiss { .. } => "resolution_miss",
            Error::NotFound(_) => "not_found",
            Error::Lifecycle(e) => match e {
                LifecycleError::DeleteFailed { .. } => "delete_failed",
                LifecycleError::PromoteFailed { .. } => "promote_failed",
                LifecycleError::ScanFailed { .. } => "scan_failed",
                LifecycleError::NameExhausted { .. } => "name_exhausted",
            },
            Error::QueueFull { .. } => "queue_full",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::InvalidFileName { name, .. } => Some(serde_json::json!({
                "file_name": name,
            })),
            Error::ResolutionMiss { stem } => Some(serde_json::json!({
                "candidate_stem": stem,
            })),
            Error::Process(ProcessError::NonZeroExit { exit_code, .. }) => {
                Some(serde_json::json!({
                    "exit_code": exit_code,
                }))
            }
            Error::QueueFull { limit } => Some(serde_json::json!({
                "limit": limit,
            })),
            _ => None,
        };

        ApiError {
            success: false,
            error: message,
            code,
            details,
        }
    }
}
