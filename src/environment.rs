//! Host environment detection and invocation strategies
//!
//! The extraction tool is launched differently depending on where this process runs:
//!
//! | Environment | Program | Output template |
//! |---|---|---|
//! | [`PosixNative`](EnvironmentKind::PosixNative) | `yt-dlp` | `<dir>/<stem>.%(ext)s` |
//! | [`PosixUnderCompatLayer`](EnvironmentKind::PosixUnderCompatLayer) | `python3 -m yt_dlp` | `<dir>/<stem>.%(ext)s` |
//! | [`WindowsNative`](EnvironmentKind::WindowsNative) | `yt-dlp.exe` | `<dir>\%(title)s.%(ext)s` |
//!
//! Detection happens once; the chosen [`InvocationStrategy`] is injected into the
//! downloader so the runner and resolver never branch on the environment.

use crate::config::{Config, ToolsConfig};
use crate::format::FormatSelection;
use crate::stem::CandidateStem;
use crate::types::{DownloadRequest, InvocationPlan};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use utoipa::ToSchema;

/// Mutually exclusive host environments
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    /// Linux, macOS, BSD
    PosixNative,
    /// POSIX process hosted on a path-translated Windows filesystem (WSL)
    PosixUnderCompatLayer,
    /// Windows
    WindowsNative,
}

impl EnvironmentKind {
    /// Stable name for logs and the health endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentKind::PosixNative => "posix_native",
            EnvironmentKind::PosixUnderCompatLayer => "posix_under_compat_layer",
            EnvironmentKind::WindowsNative => "windows_native",
        }
    }
}

/// Raw signals read from the host
#[derive(Clone, Debug, Default)]
pub struct EnvironmentSignals {
    /// Compiled for Windows
    pub windows: bool,
    /// `WSL_DISTRO_NAME`
    pub wsl_distro: Option<String>,
    /// `WSL_INTEROP` is set
    pub wsl_interop: bool,
    /// Contents of `/proc/sys/kernel/osrelease`
    pub kernel_release: Option<String>,
}

impl EnvironmentSignals {
    /// Read the signals of the current process
    pub fn current() -> Self {
        let kernel_release = if cfg!(target_os = "linux") {
            std::fs::read_to_string("/proc/sys/kernel/osrelease").ok()
        } else {
            None
        };
        Self {
            windows: cfg!(windows),
            wsl_distro: std::env::var("WSL_DISTRO_NAME")
                .ok()
                .filter(|v| !v.is_empty()),
            wsl_interop: std::env::var_os("WSL_INTEROP").is_some(),
            kernel_release,
        }
    }

    fn indicates_compat_layer(&self) -> bool {
        let kernel_says = self.kernel_release.as_deref().is_some_and(|release| {
            let release = release.to_ascii_lowercase();
            release.contains("microsoft") || release.contains("wsl")
        });
        self.wsl_distro.is_some() || self.wsl_interop || kernel_says
    }
}

/// Classify the host; contradictory signals fall back to [`EnvironmentKind::PosixNative`]
pub fn classify(signals: &EnvironmentSignals) -> EnvironmentKind {
    match (signals.windows, signals.indicates_compat_layer()) {
        (true, false) => EnvironmentKind::WindowsNative,
        (false, true) => EnvironmentKind::PosixUnderCompatLayer,
        (false, false) => EnvironmentKind::PosixNative,
        (true, true) => {
            tracing::warn!(
                ?signals,
                "ambiguous environment signals, defaulting to posix_native"
            );
            EnvironmentKind::PosixNative
        }
    }
}

/// Builds an [`InvocationPlan`] for one request
pub trait InvocationStrategy: Send + Sync + std::fmt::Debug {
    /// Environment this strategy targets
    fn kind(&self) -> EnvironmentKind;

    /// Build the immutable plan for a job
    fn build_plan(
        &self,
        request: &DownloadRequest,
        format: &FormatSelection,
        output_dir: &Path,
        stem: CandidateStem,
    ) -> InvocationPlan;
}

/// Program plus leading arguments (e.g. `python3 -m yt_dlp`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program to spawn
    pub program: PathBuf,
    /// Arguments placed before the yt-dlp options
    pub leading_args: Vec<String>,
}

/// Escape a directory for embedding in a yt-dlp output template
///
/// `%` is doubled so the template engine keeps it literal, and every separator is
/// rewritten to `separator`.
pub fn escape_template_dir(dir: &Path, separator: char) -> String {
    let raw = dir.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '%' => escaped.push_str("%%"),
            '/' | '\\' => escaped.push(separator),
            other => escaped.push(other),
        }
    }
    while escaped.len() > 1 && escaped.ends_with(separator) {
        escaped.pop();
    }
    escaped
}

fn common_arguments(
    request: &DownloadRequest,
    format: &FormatSelection,
    template: &str,
    extra_args: &[String],
) -> Vec<String> {
    let mut args: Vec<String> = [
        "--no-playlist",
        "--restrict-filenames",
        "--newline",
        "--no-progress",
        "-f",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format.expression.clone());
    if !format.format.is_audio_only() {
        args.push("--merge-output-format".to_string());
        args.push("mp4".to_string());
    }
    args.push("-o".to_string());
    args.push(template.to_string());
    args.push("--print".to_string());
    args.push("after_move:filepath".to_string());
    args.push("--no-simulate".to_string());
    args.extend(extra_args.iter().cloned());
    args.push("--".to_string());
    args.push(request.locator.trim().to_string());
    args
}

fn assemble(
    command: &ToolCommand,
    request: &DownloadRequest,
    format: &FormatSelection,
    output_dir: &Path,
    stem: CandidateStem,
    template: String,
    extra_args: &[String],
) -> InvocationPlan {
    let mut arguments = command.leading_args.clone();
    arguments.extend(common_arguments(request, format, &template, extra_args));
    InvocationPlan {
        executable: command.program.clone(),
        arguments,
        output_template: template,
        candidate_stem: stem,
        output_dir: output_dir.to_path_buf(),
        expected_extension: format.container(),
    }
}

/// yt-dlp binary on a POSIX host, fixed-stem output names
#[derive(Clone, Debug)]
pub struct PosixNativeStrategy {
    command: ToolCommand,
    extra_args: Vec<String>,
}

impl PosixNativeStrategy {
    /// Create with an explicit command
    pub fn new(command: ToolCommand, extra_args: Vec<String>) -> Self {
        Self {
            command,
            extra_args,
        }
    }
}

impl InvocationStrategy for PosixNativeStrategy {
    fn kind(&self) -> EnvironmentKind {
        EnvironmentKind::PosixNative
    }

    fn build_plan(
        &self,
        request: &DownloadRequest,
        format: &FormatSelection,
        output_dir: &Path,
        stem: CandidateStem,
    ) -> InvocationPlan {
        let template = format!("{}/{}.%(ext)s", escape_template_dir(output_dir, '/'), stem);
        assemble(
            &self.command,
            request,
            format,
            output_dir,
            stem,
            template,
            &self.extra_args,
        )
    }
}

/// yt-dlp as a Python module under WSL, fixed-stem output names, `/` separators
#[derive(Clone, Debug)]
pub struct CompatLayerStrategy {
    command: ToolCommand,
    extra_args: Vec<String>,
}

impl CompatLayerStrategy {
    /// Create with an explicit command
    pub fn new(command: ToolCommand, extra_args: Vec<String>) -> Self {
        Self {
            command,
            extra_args,
        }
    }
}

impl InvocationStrategy for CompatLayerStrategy {
    fn kind(&self) -> EnvironmentKind {
        EnvironmentKind::PosixUnderCompatLayer
    }

    fn build_plan(
        &self,
        request: &DownloadRequest,
        format: &FormatSelection,
        output_dir: &Path,
        stem: CandidateStem,
    ) -> InvocationPlan {
        // Paths pasted from the Windows side may still carry backslashes.
        let template = format!("{}/{}.%(ext)s", escape_template_dir(output_dir, '/'), stem);
        assemble(
            &self.command,
            request,
            format,
            output_dir,
            stem,
            template,
            &self.extra_args,
        )
    }
}

/// yt-dlp.exe on Windows, title-derived output names
#[derive(Clone, Debug)]
pub struct WindowsNativeStrategy {
    command: ToolCommand,
    extra_args: Vec<String>,
}

impl WindowsNativeStrategy {
    /// Create with an explicit command
    pub fn new(command: ToolCommand, extra_args: Vec<String>) -> Self {
        Self {
            command,
            extra_args,
        }
    }
}

impl InvocationStrategy for WindowsNativeStrategy {
    fn kind(&self) -> EnvironmentKind {
        EnvironmentKind::WindowsNative
    }

    fn build_plan(
        &self,
        request: &DownloadRequest,
        format: &FormatSelection,
        output_dir: &Path,
        stem: CandidateStem,
    ) -> InvocationPlan {
        let template = format!("{}\\%(title)s.%(ext)s", escape_template_dir(output_dir, '\\'));
        assemble(
            &self.command,
            request,
            format,
            output_dir,
            stem,
            template,
            &self.extra_args,
        )
    }
}

/// Locate a program: explicit path, then PATH lookup, then the bare first name
fn resolve_program(explicit: Option<&PathBuf>, search_path: bool, names: &[&str]) -> PathBuf {
    if let Some(path) = explicit {
        return path.clone();
    }
    if search_path {
        for name in names {
            if let Ok(found) = which::which(name) {
                return found;
            }
        }
    }
    PathBuf::from(names.first().copied().unwrap_or("yt-dlp"))
}

/// Tool command for an environment
pub fn tool_command(kind: EnvironmentKind, tools: &ToolsConfig) -> ToolCommand {
    match kind {
        EnvironmentKind::PosixNative => ToolCommand {
            program: resolve_program(tools.ytdlp_path.as_ref(), tools.search_path, &["yt-dlp"]),
            leading_args: Vec::new(),
        },
        EnvironmentKind::PosixUnderCompatLayer => ToolCommand {
            program: resolve_program(
                tools.python_path.as_ref(),
                tools.search_path,
                &["python3", "python"],
            ),
            leading_args: vec!["-m".to_string(), "yt_dlp".to_string()],
        },
        EnvironmentKind::WindowsNative => ToolCommand {
            program: resolve_program(
                tools.ytdlp_path.as_ref(),
                tools.search_path,
                &["yt-dlp.exe", "yt-dlp"],
            ),
            leading_args: Vec::new(),
        },
    }
}

/// Strategy for a known environment
pub fn strategy_for(kind: EnvironmentKind, tools: &ToolsConfig) -> Arc<dyn InvocationStrategy> {
    let command = tool_command(kind, tools);
    let extra_args = tools.extra_args.clone();
    match kind {
        EnvironmentKind::PosixNative => Arc::new(PosixNativeStrategy::new(command, extra_args)),
        EnvironmentKind::PosixUnderCompatLayer => {
            Arc::new(CompatLayerStrategy::new(command, extra_args))
        }
        EnvironmentKind::WindowsNative => Arc::new(WindowsNativeStrategy::new(command, extra_args)),
    }
}

/// Detect the host (unless overridden by config) and build its strategy
pub fn select_strategy(config: &Config) -> Arc<dyn InvocationStrategy> {
    let kind = match config.environment {
        Some(kind) => {
            tracing::info!(environment = kind.as_str(), "using configured environment");
            kind
        }
        None => {
            let kind = classify(&EnvironmentSignals::current());
            tracing::info!(environment = kind.as_str(), "detected environment");
            kind
        }
    };
    strategy_for(kind, &config.tools)
}
