//! Job orchestration.
//!
//! One orchestrator task per job owns all mutation of that job's state.
//! It admits the request, drives planning → clip production → assembly →
//! finalize, persists the job at every step boundary, emits progress
//! events, and decides the abort policy: any failed clip, failed assembly
//! step, or planning failure fails the job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use adreel_models::{
    normalize_script, AdEvent, AdJob, ClipRecord, CreateAdRequest, JobId, JobStatus,
};
use adreel_storage::ArtifactPaths;

use crate::assembly::assemble;
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::planner::plan_segments;
use crate::producer::produce_clips;
use crate::progress::ProgressSender;
use crate::registry::JobRegistry;

/// Cooperative cancellation flag, checked at step and clip boundaries.
#[derive(Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Existing artifacts stay intact for resumption.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Admit an ad creation request.
///
/// Validates the request before any state is created, uploads the
/// character image to object storage, and persists the initial job in
/// `pending`. The job document references the image by URL only; the
/// decoded bytes are dropped before the first save so the document stays
/// far below the store's size limit.
pub async fn admit_job(
    ctx: &PipelineContext,
    user_id: &str,
    request: &CreateAdRequest,
) -> PipelineResult<AdJob> {
    let normalized = normalize_script(&request.script);
    if normalized.is_empty() {
        return Err(PipelineError::validation("script is empty after normalization"));
    }

    let image_bytes = request
        .decode_character_image()
        .map_err(|e| PipelineError::validation(e.to_string()))?;

    let job_id = JobId::new();
    let paths = ArtifactPaths::new(user_id, &job_id);

    let image_key = paths.character_image();
    ctx.artifacts
        .put(&image_key, image_bytes, "image/png")
        .await?;

    let mut job = AdJob::new(user_id, &request.script, &normalized, &image_key);
    job.job_id = job_id;
    job.campaign_id = request.campaign_id.clone();
    job.character_name = request.character_name.clone();
    job.voice_id = request.voice_id.clone();
    job.aspect_ratio = request.aspect_ratio;
    job.resolution = request.resolution;
    job.enable_verification = request.enable_verification;
    job.verification_threshold = request.verification_threshold;

    ctx.jobs.save(&job).await?;

    info!(job_id = %job.job_id, user_id, "Admitted ad job");
    Ok(job)
}

/// Run the orchestrator task for a job to its terminal state.
///
/// Never panics the caller: every failure path marks the job failed,
/// persists it best-effort, and emits a terminal `error` event. Consumer
/// disconnects never stop the run; the job is durably persisted and a
/// polling client can re-attach.
pub async fn run_job(
    ctx: PipelineContext,
    registry: JobRegistry,
    user_id: String,
    job_id: JobId,
    progress: ProgressSender,
    cancel: CancelFlag,
) {
    let log = JobLogger::new(&job_id);

    let _lease = match registry.acquire(&job_id) {
        Ok(lease) => lease,
        Err(e) => {
            log.error("admission", &e.to_string());
            progress.emit(AdEvent::error(e.to_string())).await;
            return;
        }
    };

    let mut job = match ctx.jobs.load(&user_id, &job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            log.error("admission", "job document not found");
            progress.emit(AdEvent::error("job not found")).await;
            return;
        }
        Err(e) => {
            log.error("admission", &e.to_string());
            progress.emit(AdEvent::error(e.to_string())).await;
            return;
        }
    };

    let outcome = match tokio::time::timeout(
        ctx.config.job_timeout,
        drive(&ctx, &mut job, &progress, &cancel),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(PipelineError::StepTimeout("job")),
    };

    match outcome {
        Ok(final_url) => {
            job.complete(&final_url);
            if let Err(e) = ctx.jobs.save(&job).await {
                // The artifact is published; the stream still completes,
                // and a later poll will retry against the stale document.
                error!(job_id = %job.job_id, "Failed to persist completed job: {}", e);
            }
            log.step("finalize", "Job completed");
            progress.emit(AdEvent::complete(job.job_id.clone(), final_url)).await;
        }
        Err(e) => {
            let reason = e.failure_reason();
            log.error("orchestrator", &format!("Job failed ({reason}): {e}"));
            job.fail(&reason);
            if let Err(save_err) = ctx.jobs.save(&job).await {
                error!(job_id = %job.job_id, "Failed to persist failed job: {}", save_err);
            }
            progress.emit(AdEvent::error(e.to_string())).await;
        }
    }
}

/// Drive the step sequence and return the published final URL.
async fn drive(
    ctx: &PipelineContext,
    job: &mut AdJob,
    progress: &ProgressSender,
    cancel: &CancelFlag,
) -> PipelineResult<String> {
    let log = JobLogger::new(&job.job_id);
    let paths = ArtifactPaths::new(&job.user_id, &job.job_id);

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    // Reconcile before planning: storage knows which clips exist, the job
    // document knows which segments were planned. Clips without planner
    // output cannot be resumed.
    let existing = ctx.artifacts.existing_clip_indices(&paths).await?;
    if !existing.is_empty() && job.segments.is_empty() {
        return Err(PipelineError::resume_skew(format!(
            "{} clip artifacts present but job has no planner output",
            existing.len()
        )));
    }

    // Planning. On resume the planner output is reloaded from the job
    // document, never regenerated.
    progress.emit(AdEvent::planning_started()).await;
    if job.segments.is_empty() {
        job.set_status(JobStatus::Planning, "Planning shots");
        job.raise_progress(10);
        ctx.jobs.save(job).await?;

        let segments = match tokio::time::timeout(
            ctx.config.planning_timeout,
            plan_segments(ctx, &job.normalized_script, &job.character_name),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(PipelineError::StepTimeout("planning")),
        };

        job.clips = (0..segments.len() as u32).map(ClipRecord::absent).collect();
        job.segments = segments;
        log.step("planning", &format!("Planned {} shots", job.segments.len()));
    } else {
        log.step("planning", &format!("Reusing {} planned shots", job.segments.len()));
    }

    let total = job.segments.len() as u32;
    job.set_status(JobStatus::GeneratingClips, "Generating clips");
    job.raise_progress(20);
    ctx.jobs.save(job).await?;
    progress.emit(AdEvent::planning_complete(total)).await;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    // Clip production, strictly sequential.
    produce_clips(ctx, job, progress, cancel).await?;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    // Assembly and publish.
    assemble(ctx, job, progress).await
}
