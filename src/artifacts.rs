//! Artifact lifecycle: deletion by name, promotion out of scratch directories, expiry
//!
//! Everything here works on one shared output directory. Job scratch directories live
//! under its hidden `.jobs/` subdirectory and are never served.

use crate::error::{Error, LifecycleError, Result};
use crate::resolver::{epoch_ms_now, list_entries};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the hidden directory holding per-job scratch directories
pub const SCRATCH_DIR_NAME: &str = ".jobs";

/// Maximum number of suffixed names tried when promoting into a taken name
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Root of all scratch directories for `output_dir`
pub fn scratch_root(output_dir: &Path) -> PathBuf {
    output_dir.join(SCRATCH_DIR_NAME)
}

/// Check a client-supplied file name before it is joined to the output directory
///
/// Names containing `..`, `/` or `\` are rejected so a request can never address
/// anything outside the shared directory.
pub fn validate_file_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name.contains("..") {
        Some("name contains '..'")
    } else if name.contains('/') {
        Some("name contains '/'")
    } else if name.contains('\\') {
        Some("name contains '\\'")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(Error::InvalidFileName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Delete one artifact from `output_dir`
///
/// Hidden names (including the scratch root) are reported as missing.
pub async fn delete_by_name(output_dir: &Path, file_name: &str) -> Result<PathBuf> {
    validate_file_name(file_name)?;
    if file_name.starts_with('.') {
        return Err(Error::NotFound(file_name.to_string()));
    }

    let path = output_dir.join(file_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(path = ?path, "deleted artifact");
            Ok(path)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::NotFound(file_name.to_string()))
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "failed to delete artifact");
            Err(LifecycleError::DeleteFailed {
                path,
                reason: e.to_string(),
            }
            .into())
        }
    }
}

/// Outcome of one expiry sweep
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Names of removed files and scratch directories
    pub deleted: Vec<String>,
    /// Names that could not be removed, with the reason
    pub failed: Vec<(String, String)>,
    /// Entries younger than the threshold
    pub kept: usize,
}

/// Delete every entry of `output_dir` strictly older than `max_age`
pub async fn sweep_expired(output_dir: &Path, max_age: Duration) -> Result<SweepReport> {
    sweep_expired_at(output_dir, max_age, epoch_ms_now()).await
}

/// [`sweep_expired`] with an explicit `now` in epoch milliseconds
///
/// Ages are compared at millisecond resolution: an entry exactly `max_age` old is kept.
/// Top-level files and job scratch directories are considered; other directories and
/// hidden files are left alone.
pub async fn sweep_expired_at(
    output_dir: &Path,
    max_age: Duration,
    now_ms: u64,
) -> Result<SweepReport> {
    let max_age_ms = max_age.as_millis() as u64;
    let mut report = SweepReport::default();

    let entries = match list_entries(output_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = ?output_dir, "output directory missing, nothing to sweep");
            return Ok(report);
        }
        Err(e) => {
            return Err(LifecycleError::ScanFailed {
                path: output_dir.to_path_buf(),
                reason: e.to_string(),
            }
            .into());
        }
    };

    for entry in entries {
        if entry.is_dir || entry.name.starts_with('.') {
            continue;
        }
        let age_ms = now_ms.saturating_sub(entry.modified_at_epoch_ms);
        if age_ms <= max_age_ms {
            report.kept += 1;
            continue;
        }
        match tokio::fs::remove_file(&entry.path).await {
            Ok(()) => {
                tracing::debug!(path = ?entry.path, age_ms, "expired artifact removed");
                report.deleted.push(entry.name);
            }
            Err(e) => {
                tracing::warn!(path = ?entry.path, error = %e, "failed to remove expired artifact");
                report.failed.push((entry.name, e.to_string()));
            }
        }
    }

    let scratch = scratch_root(output_dir);
    if let Ok(scratch_entries) = list_entries(&scratch).await {
        for entry in scratch_entries {
            let age_ms = now_ms.saturating_sub(entry.modified_at_epoch_ms);
            if age_ms <= max_age_ms {
                continue;
            }
            let removal = if entry.is_dir {
                tokio::fs::remove_dir_all(&entry.path).await
            } else {
                tokio::fs::remove_file(&entry.path).await
            };
            let name = format!("{SCRATCH_DIR_NAME}/{}", entry.name);
            match removal {
                Ok(()) => {
                    tracing::debug!(path = ?entry.path, "stale scratch entry removed");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(
                        path = ?entry.path,
                        error = %e,
                        "failed to remove scratch entry"
                    );
                    report.failed.push((name, e.to_string()));
                }
            }
        }
    }

    tracing::info!(
        dir = ?output_dir,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        kept = report.kept,
        "expiry sweep finished"
    );
    Ok(report)
}

/// Name for the `attempt`-th alternative of `file_name` (`clip.mp4` -> `clip_1.mp4`)
fn suffixed_name(file_name: &str, attempt: u32) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, attempt, ext.to_string_lossy()),
        None => format!("{stem}_{attempt}"),
    }
}

/// Reserve a free name in `dest_dir` by creating an empty placeholder
async fn reserve_destination(dest_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let desired = dest_dir.join(file_name);
    for attempt in 0..=MAX_RENAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            desired.clone()
        } else {
            dest_dir.join(suffixed_name(file_name, attempt))
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(LifecycleError::PromoteFailed {
                    source_path: PathBuf::from(file_name),
                    dest_path: candidate,
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }
    Err(LifecycleError::NameExhausted {
        path: desired,
        attempts: MAX_RENAME_ATTEMPTS,
    }
    .into())
}

async fn same_dir(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Move a resolved file into `dest_dir`, never overwriting an existing artifact
///
/// Files already inside `dest_dir` are returned unchanged. A taken name gets a numeric
/// suffix. Returns the final path.
pub async fn promote(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    if let Some(parent) = source.parent()
        && same_dir(parent, dest_dir).await
    {
        return Ok(source.to_path_buf());
    }

    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LifecycleError::PromoteFailed {
            source_path: source.to_path_buf(),
            dest_path: dest_dir.to_path_buf(),
            reason: "source has no file name".to_string(),
        })?;

    let dest = reserve_destination(dest_dir, &file_name).await?;

    if let Err(rename_err) = tokio::fs::rename(source, &dest).await {
        // Rename fails across filesystems; fall back to copy and remove.
        tracing::debug!(error = %rename_err, "rename failed, copying instead");
        let copied = async {
            tokio::fs::copy(source, &dest).await?;
            tokio::fs::remove_file(source).await
        }
        .await;
        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(LifecycleError::PromoteFailed {
                source_path: source.to_path_buf(),
                dest_path: dest,
                reason: e.to_string(),
            }
            .into());
        }
    }

    tracing::debug!(from = ?source, to = ?dest, "promoted artifact");
    Ok(dest)
}

/// A job's scratch directory, removed when the job ends
///
/// [`remove`](Self::remove) is the normal path. If the owner is dropped first (the
/// request future was cancelled mid-download) the directory is removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create a fresh scratch directory for a job
    pub async fn create(output_dir: &Path, stem: &str) -> Result<Self> {
        let path = scratch_root(output_dir).join(stem);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything left in it, logging failures
    pub async fn remove(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            log_remove_failure(&self.path, &e);
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        tracing::debug!(dir = ?self.path, "removing scratch directory of abandoned job");
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            log_remove_failure(&self.path, &e);
        }
    }
}

fn log_remove_failure(dir: &Path, e: &std::io::Error) {
    if e.kind() != std::io::ErrorKind::NotFound {
        tracing::warn!(dir = ?dir, error = %e, "failed to remove scratch directory");
    }
}
