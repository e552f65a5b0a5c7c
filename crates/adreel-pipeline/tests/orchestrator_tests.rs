//! End-to-end pipeline scenarios against in-memory collaborators.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use adreel_engine::{
    BackoffConfig, EngineError, EngineResult, GenerationInput, PlannedShot, ScriptPlanner,
    SpeechEngine, VerificationOutcome, VideoEngine, VisionVerifier,
};
use adreel_models::{AdJob, ClipStatus, CreateAdRequest, JobId, JobStatus};
use adreel_pipeline::{
    admit_job, progress_channel, run_job, ArtifactStore, CancelFlag, JobRegistry, JobStore,
    MuxTool, PipelineConfig, PipelineContext, PipelineError, PipelineResult, ProgressReceiver,
};
use adreel_storage::ArtifactPaths;

// base64 of b"png-character"
const CHARACTER_IMAGE_B64: &str = "cG5nLWNoYXJhY3Rlcg==";
const CHARACTER_IMAGE_BYTES: &[u8] = b"png-character";

// ============================================================================
// In-memory collaborators
// ============================================================================

#[derive(Default)]
struct MemoryArtifacts {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifacts {
    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    }

    fn get_sync(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> PipelineResult<()> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> PipelineResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| adreel_storage::StorageError::not_found(key).into())
    }

    async fn existing_clip_indices(&self, paths: &ArtifactPaths) -> PipelineResult<BTreeSet<u32>> {
        let prefix = paths.clips_prefix();
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, v)| k.starts_with(&prefix) && !v.is_empty())
            .filter_map(|(k, _)| ArtifactPaths::parse_clip_index(k))
            .collect())
    }

    async fn signed_url(&self, key: &str, _ttl: Duration) -> PipelineResult<String> {
        Ok(format!("https://signed.test/{key}"))
    }
}

#[derive(Default)]
struct MemoryJobs {
    jobs: Mutex<HashMap<String, AdJob>>,
    save_count: AtomicUsize,
}

impl MemoryJobs {
    fn get_sync(&self, job_id: &JobId) -> Option<AdJob> {
        self.jobs.lock().unwrap().get(job_id.as_str()).cloned()
    }

    fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobs {
    async fn save(&self, job: &AdJob) -> PipelineResult<()> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_id.to_string(), job.clone());
        Ok(())
    }

    async fn load(&self, _user_id: &str, job_id: &JobId) -> PipelineResult<Option<AdJob>> {
        Ok(self.jobs.lock().unwrap().get(job_id.as_str()).cloned())
    }
}

#[derive(Default)]
struct FakeMux {
    concat_calls: Mutex<Vec<Vec<String>>>,
    frame_calls: AtomicUsize,
    fail_frame_extraction: bool,
}

#[async_trait]
impl MuxTool for FakeMux {
    async fn concat(&self, clip_urls: &[String]) -> PipelineResult<Vec<u8>> {
        self.concat_calls.lock().unwrap().push(clip_urls.to_vec());
        Ok(format!("merged:{}", clip_urls.len()).into_bytes())
    }

    async fn replace_audio(&self, _video: &[u8], _audio: &[u8]) -> PipelineResult<Vec<u8>> {
        Ok(b"final-video".to_vec())
    }

    async fn extract_last_frame(&self, video: &[u8]) -> PipelineResult<Vec<u8>> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_frame_extraction {
            return Err(adreel_media::MediaError::ffmpeg_failed("decode failed", None, Some(1)).into());
        }
        Ok(format!("frame:{}", String::from_utf8_lossy(video)).into_bytes())
    }

    async fn probe_duration(&self, _video: &[u8]) -> PipelineResult<Option<f64>> {
        Ok(Some(7.0))
    }
}

struct FakePlanner {
    /// One planned answer per call, reused from the last entry when the
    /// queue runs dry.
    answers: Mutex<VecDeque<Vec<PlannedShot>>>,
    calls: AtomicUsize,
}

impl FakePlanner {
    fn with_answers(answers: Vec<Vec<PlannedShot>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn covering(script_sentences: &[&str]) -> Self {
        let shots = script_sentences
            .iter()
            .enumerate()
            .map(|(i, s)| PlannedShot {
                spoken_text: s.to_string(),
                visual_prompt: format!("shot {i}: medium shot, studio set"),
            })
            .collect();
        Self::with_answers(vec![shots])
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptPlanner for FakePlanner {
    async fn plan(
        &self,
        _script: &str,
        _character_name: &str,
        _target_seconds_per_clip: u32,
        _correction: Option<&str>,
    ) -> EngineResult<Vec<PlannedShot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers.front().cloned().unwrap_or_default()
        };
        Ok(answer)
    }
}

enum VideoOutcome {
    Ok,
    Rejected,
    Transient,
}

#[derive(Clone, Debug)]
struct RecordedGeneration {
    prompt: String,
    reference_image: Vec<u8>,
}

struct FakeVideo {
    outcomes: Mutex<VecDeque<VideoOutcome>>,
    calls: Mutex<Vec<RecordedGeneration>>,
}

impl FakeVideo {
    fn always_ok() -> Self {
        Self::with_outcomes(vec![])
    }

    fn with_outcomes(outcomes: Vec<VideoOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls(&self) -> Vec<RecordedGeneration> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoEngine for FakeVideo {
    async fn generate(&self, input: &GenerationInput) -> EngineResult<Vec<u8>> {
        self.calls.lock().unwrap().push(RecordedGeneration {
            prompt: input.prompt.clone(),
            reference_image: input.reference_image.clone(),
        });

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VideoOutcome::Ok);
        match outcome {
            VideoOutcome::Ok => Ok(format!("video[{}]", input.prompt).into_bytes()),
            VideoOutcome::Rejected => Err(EngineError::rejected("unsafe combination")),
            VideoOutcome::Transient => Err(EngineError::transient("engine overloaded")),
        }
    }
}

struct FakeSpeech {
    fail_always: bool,
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    async fn synthesize(&self, _text: &str, _voice_id: Option<&str>) -> EngineResult<Vec<u8>> {
        if self.fail_always {
            Err(EngineError::transient("speech service down"))
        } else {
            Ok(b"voice-track".to_vec())
        }
    }
}

struct FakeVision {
    confidence: f64,
}

#[async_trait]
impl VisionVerifier for FakeVision {
    async fn verify(&self, _clip: &[u8], _spoken: &str) -> EngineResult<VerificationOutcome> {
        Ok(VerificationOutcome {
            confidence: self.confidence,
            visual_description: "a character speaking to camera".to_string(),
            feedback: "identity drift on the left edge".to_string(),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    ctx: PipelineContext,
    artifacts: Arc<MemoryArtifacts>,
    jobs: Arc<MemoryJobs>,
    mux: Arc<FakeMux>,
    planner: Arc<FakePlanner>,
    video: Arc<FakeVideo>,
    registry: JobRegistry,
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        backoff: BackoffConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        },
        ..PipelineConfig::default()
    }
}

fn harness(planner: FakePlanner, video: FakeVideo) -> Harness {
    harness_with(planner, video, FakeMux::default(), FakeSpeech { fail_always: false }, None)
}

fn harness_with(
    planner: FakePlanner,
    video: FakeVideo,
    mux: FakeMux,
    speech: FakeSpeech,
    vision: Option<FakeVision>,
) -> Harness {
    let artifacts = Arc::new(MemoryArtifacts::default());
    let jobs = Arc::new(MemoryJobs::default());
    let mux = Arc::new(mux);
    let planner = Arc::new(planner);
    let video = Arc::new(video);

    let ctx = PipelineContext {
        config: fast_config(),
        artifacts: artifacts.clone(),
        jobs: jobs.clone(),
        mux: mux.clone(),
        planner: planner.clone(),
        video: video.clone(),
        speech: Arc::new(speech),
        vision: vision.map(|v| Arc::new(v) as Arc<dyn VisionVerifier>),
    };

    Harness {
        ctx,
        artifacts,
        jobs,
        mux,
        planner,
        video,
        registry: JobRegistry::new(),
    }
}

fn request(script: &str) -> CreateAdRequest {
    serde_json::from_value(serde_json::json!({
        "script": script,
        "character_image": CHARACTER_IMAGE_B64,
        "character_name": "Ava",
    }))
    .unwrap()
}

async fn drain(mut rx: ProgressReceiver) -> Vec<(String, serde_json::Value)> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let name = event.name().to_string();
        let data = serde_json::to_value(&event).unwrap();
        events.push((name, data));
    }
    events
}

async fn run_to_end(h: &Harness, job: &AdJob) -> Vec<(String, serde_json::Value)> {
    let (tx, rx) = progress_channel();
    run_job(
        h.ctx.clone(),
        h.registry.clone(),
        job.user_id.clone(),
        job.job_id.clone(),
        tx,
        CancelFlag::new(),
    )
    .await;
    drain(rx).await
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn happy_path_three_clips() {
    let h = harness(
        FakePlanner::covering(&["A.", "B.", "C."]),
        FakeVideo::always_ok(),
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B. C.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "step1",
            "step1_complete",
            "step2_clip",
            "step2_clip",
            "step2_clip",
            "step3",
            "step4",
            "step5",
            "complete"
        ]
    );

    // step1_complete carries total_clips, clip events count up, complete is last
    assert_eq!(events[1].1["total_clips"], 3);
    assert_eq!(events[2].1["current_clip"], 1);
    assert_eq!(events[3].1["current_clip"], 2);
    assert_eq!(events[4].1["current_clip"], 3);
    assert_eq!(events[8].1["status"], "completed");

    // Storage contents under the job prefix
    let prefix = format!("user123/{}", job.job_id);
    let keys = h.artifacts.keys();
    for expected in [
        "character_image.png",
        "prompts/prompt_0.txt",
        "prompts/prompt_1.txt",
        "prompts/prompt_2.txt",
        "clips/clip_0.mp4",
        "clips/clip_1.mp4",
        "clips/clip_2.mp4",
        "merged.mp4",
        "final.mp4",
    ] {
        let key = format!("{prefix}/{expected}");
        assert!(keys.contains(&key), "missing artifact {key}");
    }

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    assert_eq!(saved.progress, 100);
    assert!(saved.voice_enhanced);
    assert!(saved
        .final_video_url
        .as_deref()
        .unwrap()
        .contains("final.mp4"));
    assert_eq!(saved.segments.len(), saved.clips.len());
    assert!(saved.clips.iter().all(|c| c.status.has_artifact()));

    // The job document was persisted at every step boundary and after
    // every clip completion: admission, planning, clip records, 3 clips,
    // merge, voice, finalize, completion.
    assert!(h.jobs.save_count.load(Ordering::SeqCst) >= 8);
}

#[tokio::test]
async fn progress_is_monotonic_across_events() {
    let h = harness(
        FakePlanner::covering(&["A.", "B.", "C."]),
        FakeVideo::always_ok(),
    );
    let job = admit_job(&h.ctx, "user123", &request("A. B. C.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    let mut last = 0i64;
    for (name, data) in &events {
        if let Some(p) = data.get("progress").and_then(|p| p.as_i64()) {
            assert!(p >= last, "progress regressed at {name}: {p} < {last}");
            last = p;
        }
    }
}

#[tokio::test]
async fn continuity_chains_frames_between_clips() {
    let h = harness(
        FakePlanner::covering(&["A.", "B.", "C."]),
        FakeVideo::always_ok(),
    );
    let job = admit_job(&h.ctx, "user123", &request("A. B. C.")).await.unwrap();
    run_to_end(&h, &job).await;

    let calls = h.video.calls();
    assert_eq!(calls.len(), 3);
    // Clip 0 conditions on the character image
    assert_eq!(calls[0].reference_image, CHARACTER_IMAGE_BYTES);
    // Clip 1 conditions on clip 0's last frame
    let clip0_bytes = format!("video[{}]", calls[0].prompt);
    assert_eq!(
        calls[1].reference_image,
        format!("frame:{clip0_bytes}").into_bytes()
    );
    // Clip 2 conditions on clip 1's last frame
    let clip1_bytes = format!("video[{}]", calls[1].prompt);
    assert_eq!(
        calls[2].reference_image,
        format!("frame:{clip1_bytes}").into_bytes()
    );
}

#[tokio::test]
async fn mid_run_crash_resumes_without_regenerating() {
    let h = harness(
        FakePlanner::covering(&["A.", "B.", "C."]),
        FakeVideo::always_ok(),
    );

    // First run: admit and plan, then simulate a crash after clips 0 and 1
    // were written by seeding their artifacts and a planned job document.
    let mut job = admit_job(&h.ctx, "user123", &request("A. B. C.")).await.unwrap();
    let paths = ArtifactPaths::new("user123", &job.job_id);
    job.segments = vec![
        adreel_models::Segment { index: 0, spoken_text: "A.".into(), visual_prompt: "shot 0".into() },
        adreel_models::Segment { index: 1, spoken_text: "B.".into(), visual_prompt: "shot 1".into() },
        adreel_models::Segment { index: 2, spoken_text: "C.".into(), visual_prompt: "shot 2".into() },
    ];
    h.jobs.save(&job).await.unwrap();
    h.artifacts.insert(&paths.clip(0), b"video[shot 0]");
    h.artifacts.insert(&paths.clip(1), b"video[shot 1]");

    let events = run_to_end(&h, &job).await;

    // The planner output is reloaded, not regenerated
    assert_eq!(h.planner.call_count(), 0);
    // The video model is invoked exactly once, for clip 2
    assert_eq!(h.video.call_count(), 1);
    // Clip 2 conditions on recovered clip 1's last frame
    assert_eq!(
        h.video.calls()[0].reference_image,
        b"frame:video[shot 1]".to_vec()
    );

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    assert_eq!(saved.clips[0].status, ClipStatus::Recovered);
    assert_eq!(saved.clips[1].status, ClipStatus::Recovered);
    assert_eq!(saved.clips[2].status, ClipStatus::Completed);
    assert_eq!(saved.clips[0].artifact_url.as_deref(), Some(paths.clip(0).as_str()));

    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn content_policy_rejection_falls_back_to_character_image() {
    // Clip 0 ok; clip 1 rejected on the continuity frame, then ok on the
    // character-image fallback; clip 2 ok.
    let h = harness(
        FakePlanner::covering(&["A.", "B.", "C."]),
        FakeVideo::with_outcomes(vec![
            VideoOutcome::Ok,
            VideoOutcome::Rejected,
            VideoOutcome::Ok,
            VideoOutcome::Ok,
        ]),
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B. C.")).await.unwrap();
    run_to_end(&h, &job).await;

    let calls = h.video.calls();
    assert_eq!(calls.len(), 4);
    // Second attempt for clip 1 swapped the reference to the character image
    assert!(calls[1].reference_image.starts_with(b"frame:"));
    assert_eq!(calls[2].reference_image, CHARACTER_IMAGE_BYTES);
    assert_eq!(calls[1].prompt, calls[2].prompt);
    // Clip 2 conditions on clip 1's last frame as usual
    assert!(calls[3].reference_image.starts_with(b"frame:"));

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    assert_eq!(saved.clips[1].status, ClipStatus::Completed);
    assert_eq!(saved.clips[1].retry_count, 1);
}

#[tokio::test]
async fn second_rejection_fails_with_content_policy() {
    // Clip 0 starts from the character image; it still gets one fallback
    // attempt (same reference), and the second rejection fails the job.
    let h = harness(
        FakePlanner::covering(&["A."]),
        FakeVideo::with_outcomes(vec![VideoOutcome::Rejected, VideoOutcome::Rejected]),
    );

    let job = admit_job(&h.ctx, "user123", &request("A.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    assert_eq!(h.video.call_count(), 2);
    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Failed);
    assert_eq!(saved.error_message.as_deref(), Some("content_policy"));
    assert_eq!(saved.clips[0].status, ClipStatus::Failed);
    assert_eq!(events.last().unwrap().0, "error");
}

#[tokio::test]
async fn planning_invariant_violation_fails_after_one_retry() {
    // Both answers drop the last sentence.
    let bad_shots = vec![PlannedShot {
        spoken_text: "A.".to_string(),
        visual_prompt: "shot".to_string(),
    }];
    let h = harness(
        FakePlanner::with_answers(vec![bad_shots.clone(), bad_shots]),
        FakeVideo::always_ok(),
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    // One corrective re-prompt, then failure with no clip work done
    assert_eq!(h.planner.call_count(), 2);
    assert_eq!(h.video.call_count(), 0);
    assert!(events.iter().all(|(n, _)| n != "step2_clip"));
    assert_eq!(events.last().unwrap().0, "error");

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Failed);
    assert_eq!(saved.error_message.as_deref(), Some("planning"));
    assert!(saved.clips.is_empty());
}

#[tokio::test]
async fn planner_retry_recovers_when_correction_helps() {
    let bad = vec![PlannedShot {
        spoken_text: "A.".to_string(),
        visual_prompt: "shot".to_string(),
    }];
    let good = vec![
        PlannedShot { spoken_text: "A.".to_string(), visual_prompt: "shot 0".to_string() },
        PlannedShot { spoken_text: "B.".to_string(), visual_prompt: "shot 1".to_string() },
    ];
    let h = harness(
        FakePlanner::with_answers(vec![bad, good]),
        FakeVideo::always_ok(),
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    assert_eq!(h.planner.call_count(), 2);
    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn voice_enhancement_failure_promotes_merged() {
    let h = harness_with(
        FakePlanner::covering(&["A.", "B."]),
        FakeVideo::always_ok(),
        FakeMux::default(),
        FakeSpeech { fail_always: true },
        None,
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    assert!(!saved.voice_enhanced);
    assert!(!saved.warnings.is_empty());
    assert!(saved
        .final_video_url
        .as_deref()
        .unwrap()
        .contains("merged.mp4"));

    // final.mp4 was never written
    let prefix = format!("user123/{}", job.job_id);
    assert!(h.artifacts.get_sync(&format!("{prefix}/final.mp4")).is_none());
    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn client_disconnect_does_not_stop_the_job() {
    let h = harness(
        FakePlanner::covering(&["A.", "B.", "C.", "D.", "E."]),
        FakeVideo::always_ok(),
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B. C. D. E.")).await.unwrap();

    // Consumer goes away immediately: drop the receiver before running.
    let (tx, rx) = progress_channel();
    drop(rx);
    run_job(
        h.ctx.clone(),
        h.registry.clone(),
        job.user_id.clone(),
        job.job_id.clone(),
        tx,
        CancelFlag::new(),
    )
    .await;

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    assert!(saved.final_video_url.is_some());
    assert_eq!(saved.clips.len(), 5);
    assert!(saved.clips.iter().all(|c| c.status.has_artifact()));
}

#[tokio::test]
async fn single_segment_job_skips_continuity() {
    let h = harness(FakePlanner::covering(&["Go."]), FakeVideo::always_ok());

    let job = admit_job(&h.ctx, "user123", &request("Go.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    assert_eq!(h.video.call_count(), 1);
    // No continuity step for a single clip
    assert_eq!(h.mux.frame_calls.load(Ordering::SeqCst), 0);
    // The lone clip goes through merge as-is
    let concats = h.mux.concat_calls.lock().unwrap();
    assert_eq!(concats.len(), 1);
    assert_eq!(concats[0].len(), 1);
    drop(concats);

    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn frame_extraction_failure_falls_back_to_character_image() {
    let h = harness_with(
        FakePlanner::covering(&["A.", "B."]),
        FakeVideo::always_ok(),
        FakeMux {
            fail_frame_extraction: true,
            ..FakeMux::default()
        },
        FakeSpeech { fail_always: false },
        None,
    );

    let job = admit_job(&h.ctx, "user123", &request("A. B.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    // Clip 1 conditioned on the character image because extraction failed
    let calls = h.video.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].reference_image, CHARACTER_IMAGE_BYTES);
    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn transient_failures_retry_then_succeed() {
    let h = harness(
        FakePlanner::covering(&["A."]),
        FakeVideo::with_outcomes(vec![
            VideoOutcome::Transient,
            VideoOutcome::Transient,
            VideoOutcome::Ok,
        ]),
    );

    let job = admit_job(&h.ctx, "user123", &request("A.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    assert_eq!(h.video.call_count(), 3);
    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.clips[0].status, ClipStatus::Completed);
    assert_eq!(saved.clips[0].retry_count, 2);
    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn transient_exhaustion_fails_the_job() {
    let h = harness(
        FakePlanner::covering(&["A."]),
        FakeVideo::with_outcomes(vec![
            VideoOutcome::Transient,
            VideoOutcome::Transient,
            VideoOutcome::Transient,
        ]),
    );

    let job = admit_job(&h.ctx, "user123", &request("A.")).await.unwrap();
    let events = run_to_end(&h, &job).await;

    // Three attempts, no more
    assert_eq!(h.video.call_count(), 3);
    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Failed);
    assert_eq!(saved.clips[0].status, ClipStatus::Failed);
    assert_eq!(events.last().unwrap().0, "error");
}

#[tokio::test]
async fn empty_script_is_rejected_before_any_state() {
    let h = harness(FakePlanner::covering(&[]), FakeVideo::always_ok());

    let err = admit_job(&h.ctx, "user123", &request("   \u{00A0} "))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    // Nothing was created anywhere
    assert!(h.artifacts.is_empty());
    assert!(h.jobs.is_empty());
}

#[tokio::test]
async fn resume_skew_fails_the_job() {
    let h = harness(
        FakePlanner::covering(&["A.", "B."]),
        FakeVideo::always_ok(),
    );

    // A job document with no planner output, but clip artifacts on disk.
    let job = admit_job(&h.ctx, "user123", &request("A. B.")).await.unwrap();
    let paths = ArtifactPaths::new("user123", &job.job_id);
    h.artifacts.insert(&paths.clip(0), b"stray-clip");

    let events = run_to_end(&h, &job).await;

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Failed);
    assert_eq!(saved.error_message.as_deref(), Some("resume_skew"));
    assert_eq!(h.video.call_count(), 0);
    assert_eq!(events.last().unwrap().0, "error");
}

#[tokio::test]
async fn verification_records_observation_without_regenerating() {
    let h = harness_with(
        FakePlanner::covering(&["A."]),
        FakeVideo::always_ok(),
        FakeMux::default(),
        FakeSpeech { fail_always: false },
        Some(FakeVision { confidence: 0.4 }),
    );

    let mut req = request("A.");
    req.enable_verification = true;

    let job = admit_job(&h.ctx, "user123", &req).await.unwrap();
    let events = run_to_end(&h, &job).await;

    // Verification failed the threshold but the clip was not regenerated
    assert_eq!(h.video.call_count(), 1);
    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Completed);
    let verification = saved.clips[0].verification.as_ref().unwrap();
    assert!(!verification.passed);
    assert!((verification.confidence - 0.4).abs() < f64::EPSILON);
    assert_eq!(events.last().unwrap().0, "complete");
}

#[tokio::test]
async fn second_orchestrator_for_same_job_is_rejected() {
    let h = harness(FakePlanner::covering(&["A."]), FakeVideo::always_ok());
    let job = admit_job(&h.ctx, "user123", &request("A.")).await.unwrap();

    let _lease = h.registry.acquire(&job.job_id).unwrap();

    let (tx, rx) = progress_channel();
    run_job(
        h.ctx.clone(),
        h.registry.clone(),
        job.user_id.clone(),
        job.job_id.clone(),
        tx,
        CancelFlag::new(),
    )
    .await;

    let events = drain(rx).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "error");
    // The job document was not touched
    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Pending);
}

#[tokio::test]
async fn cancellation_is_observed_at_step_boundaries() {
    let h = harness(
        FakePlanner::covering(&["A.", "B."]),
        FakeVideo::always_ok(),
    );
    let job = admit_job(&h.ctx, "user123", &request("A. B.")).await.unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();

    let (tx, rx) = progress_channel();
    run_job(
        h.ctx.clone(),
        h.registry.clone(),
        job.user_id.clone(),
        job.job_id.clone(),
        tx,
        cancel,
    )
    .await;
    let events = drain(rx).await;

    let saved = h.jobs.get_sync(&job.job_id).unwrap();
    assert_eq!(saved.status, JobStatus::Failed);
    assert_eq!(saved.error_message.as_deref(), Some("cancelled"));
    // No clip work happened after the flag was observed
    assert_eq!(h.video.call_count(), 0);
    assert_eq!(events.last().unwrap().0, "error");
}

#[tokio::test]
async fn recovery_is_deterministic() {
    // Same storage contents + same job document => same set of generated
    // indices on every restart.
    for _ in 0..2 {
        let h = harness(
            FakePlanner::covering(&["A.", "B.", "C."]),
            FakeVideo::always_ok(),
        );
        let mut job = admit_job(&h.ctx, "user123", &request("A. B. C.")).await.unwrap();
        let paths = ArtifactPaths::new("user123", &job.job_id);
        job.segments = vec![
            adreel_models::Segment { index: 0, spoken_text: "A.".into(), visual_prompt: "s0".into() },
            adreel_models::Segment { index: 1, spoken_text: "B.".into(), visual_prompt: "s1".into() },
            adreel_models::Segment { index: 2, spoken_text: "C.".into(), visual_prompt: "s2".into() },
        ];
        h.jobs.save(&job).await.unwrap();
        h.artifacts.insert(&paths.clip(1), b"video[s1]");

        run_to_end(&h, &job).await;

        let prompts: Vec<String> = h.video.calls().iter().map(|c| c.prompt.clone()).collect();
        assert_eq!(prompts, vec!["s0".to_string(), "s2".to_string()]);
    }
}
