//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::environment::{PosixNativeStrategy, ToolCommand};
use crate::runner::JobRunner;
use crate::types::{InvocationPlan, JobResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

type Script = dyn Fn(&InvocationPlan) -> JobResult + Send + Sync;

/// Runner that replaces the external process with a closure
///
/// The closure may create files in `plan.output_dir` to simulate the tool's output.
pub(crate) struct StubRunner {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    plans: Mutex<Vec<InvocationPlan>>,
}

impl StubRunner {
    pub(crate) fn new(
        script: impl Fn(&InvocationPlan) -> JobResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            plans: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before running the script, to keep jobs in flight
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Write `{stem}.{ext}` and print its path, like a well-behaved tool
    pub(crate) fn writes_candidate() -> Self {
        Self::new(|plan| {
            let path = plan
                .output_dir
                .join(plan.candidate_stem.with_extension(plan.expected_extension));
            std::fs::write(&path, b"media").unwrap();
            JobResult::success(format!("{}\n", path.display()))
        })
    }

    /// Exit with the given code without producing anything
    pub(crate) fn fails(code: i32, stderr: &'static str) -> Self {
        Self::new(move |_| JobResult::failure(Some(code), stderr))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn plans(&self) -> Vec<InvocationPlan> {
        self.plans.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobRunner for StubRunner {
    async fn run(&self, plan: &InvocationPlan) -> JobResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.plans.lock().unwrap().push(plan.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(plan)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Config rooted in a fresh temp dir
pub(crate) fn test_config() -> (Config, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = Config::default();
    config.download.output_dir = temp_dir.path().join("downloads");
    config.tools.search_path = false;
    (config, temp_dir)
}

/// Helper to create a test MediaDownloader with the given runner.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader_with(
    config: Config,
    runner: Arc<StubRunner>,
) -> MediaDownloader {
    let strategy = Arc::new(PosixNativeStrategy::new(
        ToolCommand {
            program: PathBuf::from("yt-dlp"),
            leading_args: Vec::new(),
        },
        Vec::new(),
    ));
    MediaDownloader::with_components(config, strategy, runner)
        .await
        .unwrap()
}

/// Downloader whose runner writes the candidate file
pub(crate) async fn create_test_downloader()
-> (MediaDownloader, Arc<StubRunner>, tempfile::TempDir) {
    let (config, temp_dir) = test_config();
    let runner = Arc::new(StubRunner::writes_candidate());
    let downloader = create_test_downloader_with(config, runner.clone()).await;
    (downloader, runner, temp_dir)
}
