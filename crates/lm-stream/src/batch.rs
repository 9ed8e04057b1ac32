//! Bounded-concurrency batch execution.
//!
//! One job at a time per process, whichever coordinator started it. Each
//! input file becomes a task that
//! waits for a semaphore permit (FIFO), runs the [`StreamProcessor`], and
//! reports back with its input index so results can be returned in input
//! order. Cancelling the job fails queued acquisitions immediately and is
//! observed by in-flight runs at their next suspension point.

use crate::cancel::CancellationToken;
use crate::error::BatchError;
use crate::events::{event_names, JobEmitter, NullEmitter, ProgressEmitter, ProgressEvent};
use crate::options::{ProcessingOptions, ProcessingResult, MAX_RECOMMENDED_CONCURRENCY};
use crate::pause::PauseController;
use crate::processor::{output_path_for, RunContext, StreamProcessor};
use crate::summary::BatchSummary;
use lm_scrub::ScrubberConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Signals a job is bound to. Callers may share a token or a pause
/// controller with other components; by default each job gets fresh ones.
#[derive(Debug, Clone, Default)]
pub struct JobSignals {
    pub cancel: CancellationToken,
    pub pause: Arc<PauseController>,
}

impl JobSignals {
    pub fn new(cancel: CancellationToken, pause: Arc<PauseController>) -> Self {
        Self { cancel, pause }
    }
}

/// Everything a finished job produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub job_id: Uuid,
    /// One result per input, in input order.
    pub results: Vec<ProcessingResult>,
    pub summary: BatchSummary,
}

#[derive(Clone)]
struct JobHandle {
    id: Uuid,
    signals: JobSignals,
    emitter: Arc<dyn ProgressEmitter>,
}

/// Job running anywhere in this process.
static PROCESS_JOB: Mutex<Option<Uuid>> = Mutex::new(None);

fn process_job() -> MutexGuard<'static, Option<Uuid>> {
    PROCESS_JOB.lock().unwrap_or_else(|p| p.into_inner())
}

/// Clears both job slots when a run ends, however it ends.
struct ActiveJobGuard<'a> {
    slot: &'a Mutex<Option<JobHandle>>,
    job_id: Uuid,
}

impl Drop for ActiveJobGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = None;
        let mut process = process_job();
        if *process == Some(self.job_id) {
            *process = None;
        }
    }
}

/// Runs batches of files and exposes pause/resume/cancel for the active one.
pub struct BatchCoordinator {
    active: Mutex<Option<JobHandle>>,
    emitter: Arc<dyn ProgressEmitter>,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchCoordinator {
    pub fn new() -> Self {
        Self::with_emitter(Arc::new(NullEmitter))
    }

    /// Coordinator whose jobs report lifecycle events to `emitter`.
    pub fn with_emitter(emitter: Arc<dyn ProgressEmitter>) -> Self {
        Self {
            active: Mutex::new(None),
            emitter,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<JobHandle>> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn current(&self) -> Option<JobHandle> {
        self.slot().clone()
    }

    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Id of the running job, if any.
    pub fn active_job_id(&self) -> Option<Uuid> {
        self.slot().as_ref().map(|job| job.id)
    }

    pub fn is_paused(&self) -> bool {
        self.current()
            .map(|job| job.signals.pause.is_paused())
            .unwrap_or(false)
    }

    /// Pause the active job. Returns false when idle or already paused.
    pub fn pause(&self) -> bool {
        let Some(job) = self.current() else {
            return false;
        };
        let changed = job.signals.pause.pause();
        if changed {
            info!(job_id = %job.id, "batch paused");
            job.emitter.emit(ProgressEvent::new(event_names::BATCH_PAUSED));
        }
        changed
    }

    /// Resume the active job. Returns false when idle or not paused.
    pub fn resume(&self) -> bool {
        let Some(job) = self.current() else {
            return false;
        };
        let changed = job.signals.pause.resume();
        if changed {
            info!(job_id = %job.id, "batch resumed");
            job.emitter.emit(ProgressEvent::new(event_names::BATCH_RESUMED));
        }
        changed
    }

    /// Request cancellation of the active job. Returns false when idle or
    /// when cancellation was already requested.
    pub fn cancel(&self) -> bool {
        let Some(job) = self.current() else {
            return false;
        };
        if job.signals.cancel.is_cancelled() {
            return false;
        }
        job.signals.cancel.cancel();
        info!(job_id = %job.id, "batch cancel requested");
        job.emitter
            .emit(ProgressEvent::new(event_names::BATCH_CANCEL_REQUESTED));
        true
    }

    /// Process every input with fresh job signals.
    pub async fn run_all(
        &self,
        inputs: Vec<PathBuf>,
        output_dir: Option<PathBuf>,
        options: ProcessingOptions,
    ) -> Result<BatchOutcome, BatchError> {
        self.run_with_signals(inputs, output_dir, options, JobSignals::default())
            .await
    }

    /// Process every input, bound to caller-supplied signals.
    ///
    /// Always yields exactly one result per input. Fails only when another
    /// job is already running in this process.
    pub async fn run_with_signals(
        &self,
        inputs: Vec<PathBuf>,
        output_dir: Option<PathBuf>,
        options: ProcessingOptions,
        signals: JobSignals,
    ) -> Result<BatchOutcome, BatchError> {
        let job_id = Uuid::new_v4();
        let emitter: Arc<dyn ProgressEmitter> =
            Arc::new(JobEmitter::new(job_id.to_string(), Arc::clone(&self.emitter)));
        {
            let mut process = process_job();
            if process.is_some() {
                return Err(BatchError::JobActive);
            }
            *process = Some(job_id);
            *self.slot() = Some(JobHandle {
                id: job_id,
                signals: signals.clone(),
                emitter: Arc::clone(&emitter),
            });
        }
        let _guard = ActiveJobGuard {
            slot: &self.active,
            job_id,
        };

        let started = Instant::now();
        let concurrency = options.effective_concurrency();
        if concurrency > MAX_RECOMMENDED_CONCURRENCY {
            warn!(
                concurrency,
                recommended_max = MAX_RECOMMENDED_CONCURRENCY,
                "concurrency above recommended range"
            );
        }
        info!(%job_id, files = inputs.len(), concurrency, "batch started");
        emitter.emit(
            ProgressEvent::new(event_names::BATCH_STARTED)
                .with_progress(0, Some(inputs.len() as u64))
                .with_detail("concurrency", concurrency),
        );

        let scrubber = Arc::new(ScrubberConfig::from_options(&options.scrubber_options));
        let processor = StreamProcessor::with_scrubber(Arc::new(options), scrubber);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let output_dir = output_dir.map(Arc::new);

        let job_span = info_span!("batch", job_id = %job_id);
        let mut tasks = JoinSet::new();
        for (index, input) in inputs.iter().cloned().enumerate() {
            let processor = processor.clone();
            let semaphore = Arc::clone(&semaphore);
            let output_dir = output_dir.clone();
            let ctx = RunContext::new(signals.cancel.clone(), Arc::clone(&signals.pause))
                .with_emitter(Arc::clone(&emitter))
                .with_file_index(index);

            let task = async move {
                let permit = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let result = match permit {
                    Some(_permit) => {
                        processor
                            .run(&input, output_dir.as_deref().map(PathBuf::as_path), &ctx)
                            .await
                    }
                    None => queued_cancelled(&processor, &input, output_dir.as_deref(), &ctx),
                };
                (index, result)
            };
            tasks.spawn(task.instrument(job_span.clone()));
        }

        let mut slots: Vec<Option<ProcessingResult>> = vec![None; inputs.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => warn!(error = %err, "file task aborted"),
            }
        }

        let results: Vec<ProcessingResult> = slots
            .into_iter()
            .zip(inputs.iter())
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| {
                    ProcessingResult::failed(
                        input,
                        None,
                        "internal error: file task aborted",
                        None,
                        Duration::ZERO,
                    )
                })
            })
            .collect();

        let summary = BatchSummary::from_results(&results);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            %job_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            elapsed_ms,
            "batch finished"
        );
        emitter.emit(
            ProgressEvent::new(event_names::BATCH_FINISHED)
                .with_elapsed_ms(elapsed_ms)
                .with_detail("summary", &summary),
        );

        Ok(BatchOutcome {
            job_id,
            results,
            summary,
        })
    }
}

/// Result for a file whose slot was never granted because the job was
/// cancelled first.
fn queued_cancelled(
    processor: &StreamProcessor,
    input: &Path,
    output_dir: Option<&PathBuf>,
    ctx: &RunContext,
) -> ProcessingResult {
    let dir = output_dir
        .map(PathBuf::as_path)
        .or(processor.options().output_dir.as_deref());
    let output_path = output_path_for(input, dir, &processor.options().output_suffix).ok();
    ctx.emitter.emit(
        ProgressEvent::new(event_names::FILE_CANCELLED)
            .with_file_index(ctx.file_index)
            .with_detail("inputPath", input),
    );
    ProcessingResult::cancelled(input, output_path, None, Duration::ZERO)
}
