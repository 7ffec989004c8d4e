//! Candidate stems: the base file name assigned to a job before its real output is known
//!
//! A stem is `<base>_<format>_<millis>`. The millisecond component is strictly
//! increasing across the whole process, so two jobs never share a stem even when they
//! are created within the same millisecond.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Longest base segment kept from a desired name
const MAX_BASE_LEN: usize = 80;

/// Base used when neither a desired name nor a video id is available
const FALLBACK_BASE: &str = "video";

static VIDEO_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").ok());

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Generated base file name for one job
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CandidateStem(String);

impl CandidateStem {
    /// Build a stem for a request
    ///
    /// `desired_name` wins over the locator's video id; both are sanitized.
    pub fn generate(locator: &str, format_id: &str, desired_name: Option<&str>) -> Self {
        let base = desired_name
            .map(sanitize)
            .filter(|s| !s.is_empty())
            .or_else(|| extract_video_id(locator))
            .unwrap_or_else(|| FALLBACK_BASE.to_string());
        let format = sanitize(format_id);
        let format = if format.is_empty() { "best".to_string() } else { format };
        Self(format!("{base}_{format}_{}", next_stamp()))
    }

    /// Wrap an existing stem without generating a new timestamp
    pub fn from_raw(stem: impl Into<String>) -> Self {
        Self(stem.into())
    }

    /// The stem as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Portion of the stem before its first `.`
    ///
    /// Sanitized stems never contain a dot, so this only differs for stems built with
    /// [`CandidateStem::from_raw`].
    pub fn name_component(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// File name `{stem}.{ext}`
    pub fn with_extension(&self, ext: &str) -> String {
        format!("{}.{}", self.0, ext)
    }
}

impl fmt::Display for CandidateStem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Next strictly increasing millisecond stamp
fn next_stamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Keep `[A-Za-z0-9_-]`, replace everything else with `_`, trim and truncate
pub fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASE_LEN)
        .collect();
    mapped.trim_matches('_').to_string()
}

/// Extract an 11-character YouTube video id from a locator
///
/// Understands `watch?v=`, `youtu.be/<id>`, `/embed/<id>`, `/shorts/<id>` and `/v/<id>`.
pub fn extract_video_id(locator: &str) -> Option<String> {
    let parsed = url::Url::parse(locator.trim()).ok()?;

    let from_query = parsed
        .query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.into_owned());

    let from_path = || {
        let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
        let host = parsed.host_str().unwrap_or_default();
        if host.ends_with("youtu.be") {
            return segments.first().map(|s| s.to_string());
        }
        segments
            .windows(2)
            .find(|w| matches!(w[0], "embed" | "shorts" | "v" | "live"))
            .map(|w| w[1].to_string())
    };

    from_query
        .or_else(from_path)
        .filter(|id| is_video_id(id))
}

fn is_video_id(candidate: &str) -> bool {
    VIDEO_ID
        .as_ref()
        .is_some_and(|re| re.is_match(candidate))
}
