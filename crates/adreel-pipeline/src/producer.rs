//! Per-clip production state machine.
//!
//! Clips are produced strictly in order because clip *i*'s last frame
//! conditions clip *i*+1. Before the loop, a recovery scan adopts every
//! clip artifact already present in storage so a restarted job never
//! regenerates finished work.
//!
//! Per clip: up to `max_transient_attempts` generation attempts with
//! backoff; a content-policy rejection while conditioning on a continuity
//! frame triggers a one-shot fallback to the original character image with
//! a fresh attempt budget; a rejection on the character image itself fails
//! the clip.

use tracing::{info, warn};

use adreel_engine::{EngineError, GenerationInput};
use adreel_models::{clip_progress, AdEvent, AdJob, ClipRecord, ClipStatus, JobStatus, VerificationRecord};
use adreel_storage::ArtifactPaths;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::orchestrator::CancelFlag;
use crate::progress::ProgressSender;

/// Drive the clip loop to completion.
///
/// On return every clip record holds an artifact; any terminal clip
/// failure aborts with the error for the orchestrator's abort policy.
pub async fn produce_clips(
    ctx: &PipelineContext,
    job: &mut AdJob,
    progress: &ProgressSender,
    cancel: &CancelFlag,
) -> PipelineResult<()> {
    let log = JobLogger::new(&job.job_id);
    let paths = ArtifactPaths::new(&job.user_id, &job.job_id);
    let total = job.segments.len();

    reconcile_clip_records(ctx, job, &paths, &log).await?;
    ctx.jobs.save(job).await?;

    // The character image conditions clip 0 and every fallback attempt.
    let character_image = ctx.artifacts.get(&job.character_image_url).await?;

    // Continuity frame carried across iterations; None means "use the
    // character image".
    let mut continuity: Option<Vec<u8>> = None;

    for index in 0..total {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let clip_bytes = if job.clips[index].status.has_artifact() {
            // Recovered clip: nothing to generate, but the next clip still
            // needs this clip's last frame.
            None
        } else {
            let bytes = generate_clip(ctx, job, &paths, index, &continuity, &character_image, &log).await?;

            let artifact_key = paths.clip(index as u32);
            ctx.artifacts
                .put(&artifact_key, bytes.clone(), "video/mp4")
                .await?;

            let duration = ctx.mux.probe_duration(&bytes).await.unwrap_or(None);
            job.clips[index].complete(&artifact_key, duration);

            if job.enable_verification {
                verify_clip(ctx, job, index, &bytes).await;
            }

            ctx.jobs.save(job).await?;

            let produced = job.clips_with_artifacts();
            job.raise_progress(clip_progress(produced, total));
            progress
                .emit(AdEvent::clip_completed(produced as u32, total as u32))
                .await;

            Some(bytes)
        };

        // Prepare the continuity frame for the next clip.
        continuity = None;
        let next_needs_generation = index + 1 < total && !job.clips[index + 1].status.has_artifact();
        if next_needs_generation {
            continuity = next_continuity_frame(ctx, job, &paths, index, clip_bytes, &log).await;
        }
    }

    Ok(())
}

/// Reconcile clip records with the artifacts already in storage.
///
/// Storage is the source of truth for which clips exist: every present
/// artifact adopts `recovered` status and skips generation.
async fn reconcile_clip_records(
    ctx: &PipelineContext,
    job: &mut AdJob,
    paths: &ArtifactPaths,
    log: &JobLogger,
) -> PipelineResult<()> {
    let total = job.segments.len();
    let existing = ctx.artifacts.existing_clip_indices(paths).await?;

    if job.clips.len() != total {
        job.clips = (0..total as u32).map(ClipRecord::absent).collect();
    }

    let mut adopted = 0usize;
    for &index in &existing {
        if (index as usize) < total {
            job.clips[index as usize] = ClipRecord::recovered(index, paths.clip(index));
            adopted += 1;
        } else {
            warn!(job_id = %job.job_id, index, "Ignoring clip artifact beyond segment count");
        }
    }

    if adopted > 0 {
        log.step(
            "recovery",
            &format!("RECOVERY MODE: {adopted}/{total} clips present"),
        );
    }

    Ok(())
}

/// Run the generation state machine for one clip and return its bytes.
async fn generate_clip(
    ctx: &PipelineContext,
    job: &mut AdJob,
    paths: &ArtifactPaths,
    index: usize,
    continuity: &Option<Vec<u8>>,
    character_image: &[u8],
    log: &JobLogger,
) -> PipelineResult<Vec<u8>> {
    let segment = &job.segments[index];
    let prompt = segment.visual_prompt.clone();
    let spoken_text = segment.spoken_text.clone();

    // Persist the prompt before generating, for audit and recovery.
    ctx.artifacts
        .put(
            &paths.prompt(index as u32),
            prompt.clone().into_bytes(),
            "text/plain",
        )
        .await?;

    job.clips[index].status = ClipStatus::Generating;

    let mut reference: Vec<u8> = continuity.clone().unwrap_or_else(|| character_image.to_vec());
    let mut fallback_used = false;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let input = GenerationInput {
            prompt: prompt.clone(),
            spoken_text: spoken_text.clone(),
            reference_image: reference.clone(),
            aspect_ratio: job.aspect_ratio,
            resolution: job.resolution,
        };

        let result = match tokio::time::timeout(ctx.config.clip_timeout, ctx.video.generate(&input)).await
        {
            Ok(r) => r,
            Err(_) => Err(EngineError::Timeout(ctx.config.clip_timeout.as_secs())),
        };

        match result {
            Ok(bytes) => {
                info!(
                    job_id = %job.job_id,
                    clip = index,
                    attempt,
                    bytes = bytes.len(),
                    "Clip generated"
                );
                return Ok(bytes);
            }

            Err(EngineError::Rejected(reason)) => {
                if !fallback_used {
                    // One-shot fallback: re-condition on the original
                    // character image with a fresh attempt budget. For clip
                    // 0 the reference is unchanged; the retry still gets
                    // exactly one chance.
                    log.warn(
                        "producer",
                        &format!(
                            "Clip {index} rejected, retrying once with the character image: {reason}"
                        ),
                    );
                    fallback_used = true;
                    reference = character_image.to_vec();
                    attempt = 0;
                    job.clips[index].retry_count += 1;
                    continue;
                }

                job.clips[index].fail();
                ctx.jobs.save(job).await?;
                return Err(PipelineError::ContentPolicy(reason));
            }

            Err(e) if e.is_retryable() => {
                if attempt >= ctx.config.max_transient_attempts {
                    job.clips[index].fail();
                    ctx.jobs.save(job).await?;
                    return Err(PipelineError::ClipFailed {
                        index: index as u32,
                        reason: e.to_string(),
                    });
                }

                let delay = ctx.config.backoff.delay_for_attempt(attempt);
                log.warn(
                    "producer",
                    &format!(
                        "Clip {index} attempt {attempt} failed transiently, retrying in {}s: {e}",
                        delay.as_secs()
                    ),
                );
                job.clips[index].retry_count += 1;
                tokio::time::sleep(delay).await;
            }

            Err(e) => {
                job.clips[index].fail();
                ctx.jobs.save(job).await?;
                return Err(PipelineError::ClipFailed {
                    index: index as u32,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Obtain the continuity frame for the next clip.
///
/// Uses the freshly generated bytes when available, otherwise downloads
/// the recovered artifact. Extraction failure is logged and falls back to
/// the character image (returns `None`); it is never retried.
async fn next_continuity_frame(
    ctx: &PipelineContext,
    job: &AdJob,
    paths: &ArtifactPaths,
    index: usize,
    clip_bytes: Option<Vec<u8>>,
    log: &JobLogger,
) -> Option<Vec<u8>> {
    let bytes = match clip_bytes {
        Some(bytes) => bytes,
        None => match ctx.artifacts.get(&paths.clip(index as u32)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log.warn(
                    "producer",
                    &format!("Could not fetch clip {index} for continuity, using character image: {e}"),
                );
                return None;
            }
        },
    };

    match ctx.mux.extract_last_frame(&bytes).await {
        Ok(frame) => Some(frame),
        Err(e) => {
            log.warn(
                "producer",
                &format!("Last-frame extraction failed for clip {index}, using character image: {e}"),
            );
            None
        }
    }
}

/// Record a verification observation on a completed clip.
///
/// Verification never regenerates a clip; a low score is recorded for
/// observability and the pipeline proceeds.
async fn verify_clip(ctx: &PipelineContext, job: &mut AdJob, index: usize, bytes: &[u8]) {
    let Some(vision) = &ctx.vision else {
        warn!(job_id = %job.job_id, "Verification enabled but no vision verifier configured");
        return;
    };

    job.set_status(JobStatus::Verifying, format!("Verifying clip {}", index + 1));

    match vision.verify(bytes, &job.segments[index].spoken_text).await {
        Ok(outcome) => {
            let passed = outcome.confidence >= job.verification_threshold;
            if !passed {
                warn!(
                    job_id = %job.job_id,
                    clip = index,
                    confidence = outcome.confidence,
                    threshold = job.verification_threshold,
                    "Clip verification below threshold: {}",
                    outcome.feedback
                );
            }
            job.clips[index].verification = Some(VerificationRecord {
                confidence: outcome.confidence,
                visual_description: outcome.visual_description,
                feedback: outcome.feedback,
                passed,
            });
        }
        Err(e) => {
            warn!(job_id = %job.job_id, clip = index, "Verification call failed: {}", e);
        }
    }

    job.set_status(
        JobStatus::GeneratingClips,
        format!("Generated clip {}", index + 1),
    );
}
