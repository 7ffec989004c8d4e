//! Running the external extraction tool

use crate::types::{InvocationPlan, JobResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Executes an [`InvocationPlan`] and reports how the process ended
///
/// Implementations never fail: spawn errors are reported through
/// [`JobResult::spawn_failure`].
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run the plan to completion
    async fn run(&self, plan: &InvocationPlan) -> JobResult;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Spawns the plan's executable with `tokio::process`
///
/// No timeout is applied; if the calling future is dropped the child is killed.
#[derive(Clone, Debug, Default)]
pub struct ProcessJobRunner;

impl ProcessJobRunner {
    /// Create a runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobRunner for ProcessJobRunner {
    async fn run(&self, plan: &InvocationPlan) -> JobResult {
        tracing::debug!(
            stem = %plan.candidate_stem,
            command = %plan.display_command(),
            "spawning extraction tool"
        );

        let output = Command::new(&plan.executable)
            .args(&plan.arguments)
            .current_dir(&plan.output_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(
                    stem = %plan.candidate_stem,
                    executable = %plan.executable.display(),
                    error = %e,
                    "failed to spawn extraction tool"
                );
                return JobResult::spawn_failure(e.to_string());
            }
        };

        let result = JobResult {
            exit_succeeded: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            spawn_error: None,
        };

        if result.exit_succeeded {
            // yt-dlp writes warnings to stderr even on success
            if !result.stderr.trim().is_empty() {
                tracing::warn!(
                    stem = %plan.candidate_stem,
                    stderr = %result.stderr_tail(5),
                    "extraction tool reported warnings"
                );
            }
        } else {
            tracing::error!(
                stem = %plan.candidate_stem,
                exit_code = ?result.exit_code,
                stderr = %result.stderr_tail(10),
                "extraction tool failed"
            );
        }

        result
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
