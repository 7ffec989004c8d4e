//! Output resolution: finding the file the extraction tool actually produced
//!
//! The tool's output name is not fully predictable (title templates, container
//! merges, post-processors), so resolution walks an ordered list of tiers and the
//! first hit wins:
//!
//! 1. [`ReportedPath`](ResolutionTier::ReportedPath) - last non-empty stdout line, as a path
//! 2. [`BasenameInDirectory`](ResolutionTier::BasenameInDirectory) - that line's basename in the output directory
//! 3. [`CandidateStem`](ResolutionTier::CandidateStem) - `{stem}.{ext}` in the output directory
//! 4. [`StemPrefix`](ResolutionTier::StemPrefix) - any entry starting with the stem or its name component
//! 5. [`Recent`](ResolutionTier::Recent) - newest entry modified inside the recency window
//! 6. [`Newest`](ResolutionTier::Newest) - newest entry regardless of age
//!
//! Hidden entries and in-progress downloads (`.part`, `.ytdl`, `.temp`) are never
//! candidates.

use crate::stem::CandidateStem;
use crate::types::{DirectoryEntry, JobResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;

/// Extensions of files the tool is still writing
const PARTIAL_EXTENSIONS: [&str; 3] = ["part", "ytdl", "temp"];

/// Which tier produced a match
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// Path printed by the tool
    ReportedPath,
    /// Printed basename inside the output directory
    BasenameInDirectory,
    /// `{stem}.{ext}`
    CandidateStem,
    /// Name starts with the stem
    StemPrefix,
    /// Modified inside the recency window
    Recent,
    /// Newest entry
    Newest,
}

impl ResolutionTier {
    /// Stable name for logs and events
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::ReportedPath => "reported_path",
            ResolutionTier::BasenameInDirectory => "basename_in_directory",
            ResolutionTier::CandidateStem => "candidate_stem",
            ResolutionTier::StemPrefix => "stem_prefix",
            ResolutionTier::Recent => "recent",
            ResolutionTier::Newest => "newest",
        }
    }

    /// Tiers that depend on timestamps rather than names
    pub fn is_heuristic(&self) -> bool {
        matches!(self, ResolutionTier::Recent | ResolutionTier::Newest)
    }
}

/// A located output file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMatch {
    /// Tier that matched
    pub tier: ResolutionTier,
    /// Full path of the file
    pub path: PathBuf,
    /// File name
    pub file_name: String,
}

impl ResolvedMatch {
    fn new(tier: ResolutionTier, path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            tier,
            path,
            file_name,
        })
    }
}

/// Whether an entry name must never be resolved (hidden or still being written)
pub fn is_ignored_name(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            PARTIAL_EXTENSIONS
                .iter()
                .any(|p| ext.eq_ignore_ascii_case(p))
        })
}

/// Current time in epoch milliseconds
pub fn epoch_ms_now() -> u64 {
    epoch_ms(SystemTime::now())
}

/// Convert a timestamp to epoch milliseconds, clamping pre-epoch times to zero
pub fn epoch_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// List every entry of `dir` with its modification time
///
/// Entries whose metadata cannot be read are skipped.
pub async fn list_entries(dir: &Path) -> std::io::Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = reader.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(path = ?entry.path(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let modified = metadata.modified().map(epoch_ms).unwrap_or(0);
        entries.push(DirectoryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            modified_at_epoch_ms: modified,
            is_dir: metadata.is_dir(),
        });
    }
    Ok(entries)
}

/// Tiered search for a job's output file
#[derive(Clone, Debug)]
pub struct OutputResolver {
    recency_window: Duration,
}

impl OutputResolver {
    /// Create a resolver with the given recency window
    pub fn new(recency_window: Duration) -> Self {
        Self { recency_window }
    }

    /// Trailing window used by the recency tier
    pub fn recency_window(&self) -> Duration {
        self.recency_window
    }

    /// Resolve against the current clock
    pub async fn resolve(
        &self,
        job: &JobResult,
        output_dir: &Path,
        stem: &CandidateStem,
        expected_extension: &str,
    ) -> Option<ResolvedMatch> {
        self.resolve_at(job, output_dir, stem, expected_extension, epoch_ms_now())
            .await
    }

    /// Resolve with an explicit `now` (epoch milliseconds) for the recency tier
    pub async fn resolve_at(
        &self,
        job: &JobResult,
        output_dir: &Path,
        stem: &CandidateStem,
        expected_extension: &str,
        now_ms: u64,
    ) -> Option<ResolvedMatch> {
        let reported = job.reported_path();

        // Tier 1: only a file directly inside the output directory is claimed
        if let Some(line) = reported {
            let path = output_dir.join(line);
            tracing::debug!(tier = "reported_path", path = ?path, "trying");
            if is_file(&path).await {
                if is_direct_child(&path, output_dir).await {
                    return self.hit(ResolutionTier::ReportedPath, path, stem);
                }
                tracing::warn!(
                    path = ?path,
                    dir = ?output_dir,
                    "reported path is outside the output directory, ignoring"
                );
            }
        }

        // Tier 2
        if let Some(name) = reported.and_then(reported_basename) {
            let path = output_dir.join(name);
            tracing::debug!(tier = "basename_in_directory", path = ?path, "trying");
            if !is_ignored_name(name) && is_file(&path).await {
                return self.hit(ResolutionTier::BasenameInDirectory, path, stem);
            }
        }

        // Tier 3
        let path = output_dir.join(stem.with_extension(expected_extension));
        tracing::debug!(tier = "candidate_stem", path = ?path, "trying");
        if is_file(&path).await {
            return self.hit(ResolutionTier::CandidateStem, path, stem);
        }

        let mut files: Vec<DirectoryEntry> = match list_entries(output_dir).await {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| !e.is_dir && !is_ignored_name(&e.name))
                .collect(),
            Err(e) => {
                tracing::warn!(dir = ?output_dir, error = %e, "failed to list output directory");
                return None;
            }
        };

        // Tier 4
        tracing::debug!(tier = "stem_prefix", dir = ?output_dir, prefix = %stem, "trying");
        let name_component = stem.name_component();
        let mut prefixed: Vec<&DirectoryEntry> = files
            .iter()
            .filter(|e| e.name.starts_with(stem.as_str()) || e.name.starts_with(name_component))
            .collect();
        prefixed.sort_by(|a, b| {
            let a_other = !a.name.ends_with(&format!(".{expected_extension}"));
            let b_other = !b.name.ends_with(&format!(".{expected_extension}"));
            (a_other, &a.name).cmp(&(b_other, &b.name))
        });
        if let Some(entry) = prefixed.first() {
            return self.hit(ResolutionTier::StemPrefix, entry.path.clone(), stem);
        }

        // Newest first; ties broken by name so the result is deterministic
        files.sort_by(|a, b| {
            b.modified_at_epoch_ms
                .cmp(&a.modified_at_epoch_ms)
                .then_with(|| a.name.cmp(&b.name))
        });

        // Tier 5
        let window_ms = self.recency_window.as_millis() as u64;
        let cutoff = now_ms.saturating_sub(window_ms);
        tracing::debug!(tier = "recent", dir = ?output_dir, cutoff_ms = cutoff, "trying");
        if let Some(entry) = files.iter().find(|e| e.modified_at_epoch_ms >= cutoff) {
            return self.hit(ResolutionTier::Recent, entry.path.clone(), stem);
        }

        // Tier 6
        tracing::debug!(tier = "newest", dir = ?output_dir, "trying");
        if let Some(entry) = files.first() {
            return self.hit(ResolutionTier::Newest, entry.path.clone(), stem);
        }

        tracing::warn!(stem = %stem, dir = ?output_dir, "no output file found");
        None
    }

    fn hit(
        &self,
        tier: ResolutionTier,
        path: PathBuf,
        stem: &CandidateStem,
    ) -> Option<ResolvedMatch> {
        if tier.is_heuristic() {
            tracing::warn!(
                stem = %stem,
                tier = tier.as_str(),
                path = ?path,
                "resolved by heuristic"
            );
        } else {
            tracing::info!(stem = %stem, tier = tier.as_str(), path = ?path, "resolved output");
        }
        ResolvedMatch::new(tier, path)
    }
}

fn reported_basename(line: &str) -> Option<&str> {
    line.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

/// Whether `path` resolves to a visible entry whose parent is `dir`
///
/// Symlinks and `..` components are resolved first, so a reported path can never
/// reach outside the directory the job owns.
async fn is_direct_child(path: &Path, dir: &Path) -> bool {
    let (Ok(path), Ok(dir)) = (
        tokio::fs::canonicalize(path).await,
        tokio::fs::canonicalize(dir).await,
    ) else {
        return false;
    };
    let visible = path
        .file_name()
        .map(|name| !is_ignored_name(&name.to_string_lossy()))
        .unwrap_or(false);
    visible && path.parent() == Some(dir.as_path())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
