//! Core types and events

use crate::error::{Error, Result};
use crate::stem::CandidateStem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Inbound download request
///
/// `locator` and `format_id` must be present and non-empty. The aliases accept the
/// field names used by older browser clients (`videoUrl`, `outputPath`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Source URL of the media
    #[serde(default, alias = "videoUrl")]
    pub locator: String,

    /// Quality tier id (see `GET /formats`)
    #[serde(default)]
    pub format_id: String,

    /// Preferred base name for the produced file
    #[serde(default, alias = "outputPath", skip_serializing_if = "Option::is_none")]
    pub desired_name: Option<String>,
}

impl DownloadRequest {
    /// Create a request
    pub fn new(locator: impl Into<String>, format_id: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            format_id: format_id.into(),
            desired_name: None,
        }
    }

    /// Set the preferred base name
    pub fn with_desired_name(mut self, name: impl Into<String>) -> Self {
        self.desired_name = Some(name.into());
        self
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.locator.trim().is_empty() {
            return Err(Error::Validation("locator is required".to_string()));
        }
        if self.format_id.trim().is_empty() {
            return Err(Error::Validation("formatId is required".to_string()));
        }
        Ok(())
    }

    /// Desired name with any directory components stripped
    pub fn desired_base_name(&self) -> Option<&str> {
        self.desired_name
            .as_deref()
            .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
            .filter(|n| !n.trim().is_empty())
    }
}

/// Everything needed to launch the extraction tool for one job
///
/// Built once per request by an [`InvocationStrategy`](crate::environment::InvocationStrategy)
/// and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationPlan {
    /// Program to spawn
    pub executable: PathBuf,
    /// Full argument list, in order
    pub arguments: Vec<String>,
    /// yt-dlp output template (`-o`) as embedded in `arguments`
    pub output_template: String,
    /// Stem assigned to the job
    pub candidate_stem: CandidateStem,
    /// Directory the tool writes into
    pub output_dir: PathBuf,
    /// Extension the produced file is expected to carry
    pub expected_extension: &'static str,
}

impl InvocationPlan {
    /// Human-readable command line for logs
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.executable.display().to_string()];
        parts.extend(self.arguments.iter().map(|a| {
            if a.contains(' ') {
                format!("\"{a}\"")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Outcome of one external process run
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobResult {
    /// Whether the process started and exited with status 0
    pub exit_succeeded: bool,
    /// Exit code, `None` on spawn failure or signal termination
    pub exit_code: Option<i32>,
    /// Entire stdout
    pub stdout: String,
    /// Entire stderr
    pub stderr: String,
    /// Set when the process could not be started at all
    pub spawn_error: Option<String>,
}

impl JobResult {
    /// Successful run with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_succeeded: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            spawn_error: None,
        }
    }

    /// Failed run with the given exit code and stderr
    pub fn failure(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            exit_succeeded: false,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            spawn_error: None,
        }
    }

    /// The process never started
    pub fn spawn_failure(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            exit_succeeded: false,
            exit_code: None,
            stdout: String::new(),
            stderr: reason.clone(),
            spawn_error: Some(reason),
        }
    }

    /// Last non-empty stdout line, trimmed
    pub fn reported_path(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
    }

    /// Last `max_lines` non-empty lines of stderr
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// A produced file handed back to the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArtifact {
    /// File name inside the shared output directory
    pub file_name: String,
    /// URL path the browser can fetch the file from
    pub file_path: String,
}

/// Directory listing entry used for recency resolution and expiry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Modification time in milliseconds since the Unix epoch
    pub modified_at_epoch_ms: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Admission state of a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a free process slot
    Queued,
    /// External process running
    Running,
    /// Resolving and promoting the produced file
    Resolving,
}

/// In-flight job as listed by `GET /jobs`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Job id (its candidate stem)
    pub id: String,
    /// Source URL
    pub locator: String,
    /// Requested format id
    pub format_id: String,
    /// Current state
    pub state: JobState,
    /// When the job was admitted
    pub queued_at: DateTime<Utc>,
    /// When the external process was spawned
    pub started_at: Option<DateTime<Utc>>,
}

/// Events emitted by the downloader
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job admitted, waiting for a slot
    JobQueued {
        /// Job id
        id: String,
        /// Source URL
        locator: String,
    },
    /// External process spawned
    JobStarted {
        /// Job id
        id: String,
    },
    /// External process failed
    JobFailed {
        /// Job id
        id: String,
        /// Failure description
        error: String,
    },
    /// Produced file located
    ArtifactResolved {
        /// Job id
        id: String,
        /// Final file name
        file_name: String,
        /// Resolution tier that matched
        tier: String,
    },
    /// Process succeeded but no file matched
    ResolutionMissed {
        /// Job id
        id: String,
    },
    /// Artifact removed on request
    ArtifactDeleted {
        /// File name
        file_name: String,
    },
    /// Expiry sweep finished
    SweepCompleted {
        /// Entries removed
        deleted: usize,
        /// Entries that could not be removed
        failed: usize,
    },
    /// Downloader is shutting down
    Shutdown,
}

impl Event {
    /// Event name, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Event::JobQueued { .. } => "job_queued",
            Event::JobStarted { .. } => "job_started",
            Event::JobFailed { .. } => "job_failed",
            Event::ArtifactResolved { .. } => "artifact_resolved",
            Event::ResolutionMissed { .. } => "resolution_missed",
            Event::ArtifactDeleted { .. } => "artifact_deleted",
            Event::SweepCompleted { .. } => "sweep_completed",
            Event::Shutdown => "shutdown",
        }
    }
}
