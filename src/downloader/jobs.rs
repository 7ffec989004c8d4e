//! Download job execution: admission, invocation, resolution and promotion.

use crate::artifacts::{ScratchDir, promote};
use crate::error::{Error, ProcessError, Result};
use crate::format::select_format;
use crate::resolver::ResolvedMatch;
use crate::stem::CandidateStem;
use crate::types::{
    DownloadRequest, Event, InvocationPlan, JobInfo, JobResult, JobState, ResolvedArtifact,
};
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::MediaDownloader;

/// Number of stderr lines carried into a process error
const STDERR_TAIL_LINES: usize = 20;

/// Registration of one admitted job; releases its slot when dropped
///
/// Dropping covers every exit path, including the request future being cancelled
/// when an HTTP client disconnects.
pub(crate) struct JobGuard {
    id: String,
    jobs: Arc<Mutex<HashMap<String, JobInfo>>>,
    in_flight: Arc<AtomicUsize>,
}

impl JobGuard {
    fn set_state(&self, state: JobState) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = jobs.get_mut(&self.id) {
            if state == JobState::Running {
                info.started_at = Some(Utc::now());
            }
            info.state = state;
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MediaDownloader {
    /// Run one download job to completion
    ///
    /// Validates the request, waits for a process slot, runs the extraction tool and
    /// resolves the produced file. On success the file sits in the shared output
    /// directory and is servable under the returned `file_path`.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a missing locator or format id
    /// - [`Error::QueueFull`] when the admission gate is saturated
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// - [`Error::Process`] when the tool fails to start or exits non-zero
    /// - [`Error::ResolutionMiss`] when the tool succeeded but no file was found
    /// - [`Error::Lifecycle`] / [`Error::Io`] for scratch directory and promotion failures
    pub async fn download(&self, request: DownloadRequest) -> Result<ResolvedArtifact> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }
        request.validate()?;

        let selection = select_format(&request.format_id);
        if !selection.recognized {
            tracing::warn!(
                format_id = %request.format_id,
                fallback = selection.format.as_str(),
                "unknown format id, using default"
            );
        }

        let stem = CandidateStem::generate(
            &request.locator,
            &request.format_id,
            request.desired_base_name(),
        );
        let guard = self.admit(&stem, &request)?;

        let _permit = self
            .admission
            .concurrent_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ShuttingDown)?;

        guard.set_state(JobState::Running);
        self.emit_event(Event::JobStarted {
            id: stem.to_string(),
        });

        let output_root = self.config.output_dir().clone();
        // Removed on every exit path, including cancellation of this future
        let scratch = if self.config.download.isolate_jobs {
            Some(ScratchDir::create(&output_root, stem.as_str()).await?)
        } else {
            None
        };
        let work_dir = scratch
            .as_ref()
            .map_or_else(|| output_root.clone(), |dir| dir.path().to_path_buf());

        let plan = self
            .strategy
            .build_plan(&request, &selection, &work_dir, stem.clone());
        tracing::info!(
            job_id = %stem,
            format = selection.format.as_str(),
            command = %plan.display_command(),
            "starting download job"
        );

        let result = self.runner.run(&plan).await;
        let outcome = self.complete_job(&plan, &result, &guard, &output_root).await;

        if let Some(scratch) = scratch {
            scratch.remove().await;
        }

        match &outcome {
            Ok(artifact) => {
                tracing::info!(
                    job_id = %stem,
                    file_name = %artifact.file_name,
                    "download job finished"
                )
            }
            Err(e) => tracing::warn!(job_id = %stem, error = %e, "download job failed"),
        }
        outcome
    }

    /// Admit a job or reject it when the gate is full
    fn admit(&self, stem: &CandidateStem, request: &DownloadRequest) -> Result<JobGuard> {
        let admission = &self.admission;
        let previous = admission.in_flight.fetch_add(1, Ordering::SeqCst);
        if previous >= admission.capacity {
            admission.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                in_flight = previous,
                limit = admission.capacity,
                "rejecting download, admission gate full"
            );
            return Err(Error::QueueFull {
                limit: admission.capacity,
            });
        }

        let id = stem.to_string();
        admission
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.clone(),
                JobInfo {
                    id: id.clone(),
                    locator: request.locator.clone(),
                    format_id: request.format_id.clone(),
                    state: JobState::Queued,
                    queued_at: Utc::now(),
                    started_at: None,
                },
            );
        self.emit_event(Event::JobQueued {
            id: id.clone(),
            locator: request.locator.clone(),
        });

        Ok(JobGuard {
            id,
            jobs: admission.jobs.clone(),
            in_flight: admission.in_flight.clone(),
        })
    }

    /// Turn a finished process into an artifact (or an error)
    async fn complete_job(
        &self,
        plan: &InvocationPlan,
        result: &JobResult,
        guard: &JobGuard,
        output_root: &Path,
    ) -> Result<ResolvedArtifact> {
        let id = plan.candidate_stem.to_string();

        if !result.exit_succeeded {
            let error = process_error(plan, result);
            self.emit_event(Event::JobFailed {
                id,
                error: error.to_string(),
            });
            return Err(error.into());
        }

        guard.set_state(JobState::Resolving);
        let found = self
            .resolver
            .resolve(
                result,
                &plan.output_dir,
                &plan.candidate_stem,
                plan.expected_extension,
            )
            .await;

        let Some(ResolvedMatch { tier, path, .. }) = found else {
            self.emit_event(Event::ResolutionMissed { id: id.clone() });
            return Err(Error::ResolutionMiss { stem: id });
        };

        let final_path = promote(&path, output_root).await?;
        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::ResolutionMiss { stem: id.clone() })?;

        self.emit_event(Event::ArtifactResolved {
            id,
            file_name: file_name.clone(),
            tier: tier.as_str().to_string(),
        });

        Ok(ResolvedArtifact {
            file_path: format!("{}/{}", self.config.server.api.normalized_prefix(), file_name),
            file_name,
        })
    }

    /// Snapshot of in-flight jobs, oldest first
    pub fn list_jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .admission
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.queued_at.cmp(&b.queued_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Number of jobs admitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.admission.in_flight.load(Ordering::SeqCst)
    }
}

fn process_error(plan: &InvocationPlan, result: &JobResult) -> ProcessError {
    let executable = plan.executable.display().to_string();
    match &result.spawn_error {
        Some(reason) => ProcessError::SpawnFailed {
            executable,
            reason: reason.clone(),
        },
        None => ProcessError::NonZeroExit {
            executable,
            exit_code: result.exit_code,
            stderr: result.stderr_tail(STDERR_TAIL_LINES),
        },
    }
}
