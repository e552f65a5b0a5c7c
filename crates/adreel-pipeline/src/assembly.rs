//! Assembly: concatenate, re-voice, publish.

use adreel_engine::with_backoff;
use adreel_models::{AdEvent, AdJob, JobStatus, PROGRESS_CLIPS_DONE, PROGRESS_MERGED, PROGRESS_VOICED};
use adreel_storage::{ArtifactPaths, MUX_INPUT_URL_TTL, PUBLISH_URL_TTL};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::progress::ProgressSender;

/// Assemble the final video and return its published URL.
///
/// Concatenation references each clip by signed URL so no clip is
/// downloaded to the orchestrator host. Voice enhancement is optional:
/// when disabled or failed after bounded retry, `merged.mp4` is promoted
/// as the final artifact and the job still completes.
pub async fn assemble(
    ctx: &PipelineContext,
    job: &mut AdJob,
    progress: &ProgressSender,
) -> PipelineResult<String> {
    let log = JobLogger::new(&job.job_id);
    let paths = ArtifactPaths::new(&job.user_id, &job.job_id);

    // Concatenate
    job.set_status(JobStatus::Merging, "Merging clips");
    job.raise_progress(PROGRESS_CLIPS_DONE);
    progress.emit(AdEvent::merging()).await;
    ctx.jobs.save(job).await?;

    let mut clip_urls = Vec::with_capacity(job.clips.len());
    for clip in &job.clips {
        let key = clip
            .artifact_url
            .as_deref()
            .ok_or_else(|| PipelineError::assembly(format!("clip {} has no artifact", clip.index)))?;
        clip_urls.push(ctx.artifacts.signed_url(key, MUX_INPUT_URL_TTL).await?);
    }

    let merged = ctx
        .mux
        .concat(&clip_urls)
        .await
        .map_err(|e| PipelineError::assembly(e.to_string()))?;
    ctx.artifacts
        .put(&paths.merged(), merged.clone(), "video/mp4")
        .await?;
    job.raise_progress(PROGRESS_MERGED);
    log.step("assembly", &format!("Merged {} clips", clip_urls.len()));

    // Voice enhancement
    let final_key = if ctx.config.enable_voice_enhancement {
        match enhance_voice(ctx, job, &paths, &merged, progress).await {
            Ok(key) => {
                job.voice_enhanced = true;
                key
            }
            Err(e) => {
                log.warn(
                    "assembly",
                    &format!("Voice enhancement failed, promoting merged video: {e}"),
                );
                job.warn(format!("voice enhancement skipped: {e}"));
                paths.merged()
            }
        }
    } else {
        paths.merged()
    };
    job.raise_progress(PROGRESS_VOICED);

    // Publish
    job.set_status(JobStatus::Finalizing, "Publishing final video");
    job.raise_progress(95);
    progress.emit(AdEvent::finalizing()).await;
    ctx.jobs.save(job).await?;

    let published_url = ctx.artifacts.signed_url(&final_key, PUBLISH_URL_TTL).await?;
    Ok(published_url)
}

/// Synthesize the full script and mux it onto the merged video.
async fn enhance_voice(
    ctx: &PipelineContext,
    job: &mut AdJob,
    paths: &ArtifactPaths,
    merged: &[u8],
    progress: &ProgressSender,
) -> PipelineResult<String> {
    job.set_status(JobStatus::EnhancingVoice, "Enhancing voice track");
    job.raise_progress(80);
    progress.emit(AdEvent::enhancing_voice()).await;
    ctx.jobs.save(job).await?;

    let script = job.normalized_script.clone();
    let voice_id = job.voice_id.clone();
    let audio = with_backoff(&ctx.config.backoff, "speech_synthesize", || {
        let script = script.clone();
        let voice_id = voice_id.clone();
        async move { ctx.speech.synthesize(&script, voice_id.as_deref()).await }
    })
    .await?;

    let final_bytes = ctx.mux.replace_audio(merged, &audio).await?;
    let final_key = paths.final_video();
    ctx.artifacts
        .put(&final_key, final_bytes, "video/mp4")
        .await?;

    Ok(final_key)
}
