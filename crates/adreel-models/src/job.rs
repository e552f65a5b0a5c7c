//! Ad job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{AspectRatio, ClipRecord, Resolution, Segment};

/// Unique identifier for an ad job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline status of an ad job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Admitted, pipeline not yet started
    #[default]
    Pending,
    /// Splitting the script into segments and prompts
    Planning,
    /// Producing clips
    GeneratingClips,
    /// Running vision verification on produced clips
    Verifying,
    /// Concatenating clips
    Merging,
    /// Replacing the audio track with synthesized speech
    EnhancingVoice,
    /// Publishing the final artifact
    Finalizing,
    /// Final video published
    Completed,
    /// Terminal failure; error_message records the reason
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Planning => "planning",
            JobStatus::GeneratingClips => "generating_clips",
            JobStatus::Verifying => "verifying",
            JobStatus::Merging => "merging",
            JobStatus::EnhancingVoice => "enhancing_voice",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ad production job.
///
/// The job document is the durable record the pipeline resumes from. It
/// stays small: media bytes live in object storage and are referenced by
/// URL, never inlined here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdJob {
    /// Unique job ID
    pub job_id: JobId,

    /// Owning user
    pub user_id: String,

    /// Optional campaign this ad belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,

    /// Original script as submitted
    pub script: String,

    /// Script after normalization; the planner and speech path work from this
    pub normalized_script: String,

    /// Object-storage key of the uploaded character reference image
    pub character_image_url: String,

    /// Name used to refer to the character in prompts
    pub character_name: String,

    /// Optional voice identity for speech synthesis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// Target aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Target resolution
    #[serde(default)]
    pub resolution: Resolution,

    /// Whether to run vision verification after each clip
    #[serde(default)]
    pub enable_verification: bool,

    /// Verification confidence threshold in [0, 1]
    #[serde(default = "default_verification_threshold")]
    pub verification_threshold: f64,

    /// Planned segments, set once during planning
    #[serde(default)]
    pub segments: Vec<Segment>,

    /// Per-clip production records
    #[serde(default)]
    pub clips: Vec<ClipRecord>,

    /// Signed URL of the published final video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,

    /// Whether the final artifact carries the synthesized voice track
    #[serde(default)]
    pub voice_enhanced: bool,

    /// Job status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress (0-100), monotonically non-decreasing
    #[serde(default)]
    pub progress: u8,

    /// Human-readable description of the current step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// Terminal error reason (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Non-fatal degradations, e.g. voice enhancement skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completed at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_verification_threshold() -> f64 {
    0.6
}

impl AdJob {
    /// Create a new pending job.
    ///
    /// `character_image_url` must already point into object storage; the
    /// job document never carries raw image bytes.
    pub fn new(
        user_id: impl Into<String>,
        script: impl Into<String>,
        normalized_script: impl Into<String>,
        character_image_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            user_id: user_id.into(),
            campaign_id: None,
            script: script.into(),
            normalized_script: normalized_script.into(),
            character_image_url: character_image_url.into(),
            character_name: "character".to_string(),
            voice_id: None,
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            enable_verification: false,
            verification_threshold: default_verification_threshold(),
            segments: Vec::new(),
            clips: Vec::new(),
            final_video_url: None,
            voice_enhanced: false,
            status: JobStatus::Pending,
            progress: 0,
            current_step: None,
            error_message: None,
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to a new status and describe the step.
    pub fn set_status(&mut self, status: JobStatus, step: impl Into<String>) {
        self.status = status;
        self.current_step = Some(step.into());
        self.updated_at = Utc::now();
    }

    /// Raise progress. Progress never decreases; a lower value is ignored.
    pub fn raise_progress(&mut self, progress: u8) {
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            self.updated_at = Utc::now();
        }
    }

    /// Record a non-fatal degradation.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
        self.updated_at = Utc::now();
    }

    /// Mark the job completed with its published video URL.
    pub fn complete(&mut self, final_video_url: impl Into<String>) {
        self.status = JobStatus::Completed;
        self.final_video_url = Some(final_video_url.into());
        self.progress = 100;
        self.current_step = Some("Complete".to_string());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Mark the job failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Count of clips holding a readable artifact.
    pub fn clips_with_artifacts(&self) -> usize {
        self.clips.iter().filter(|c| c.status.has_artifact()).count()
    }

    /// Build the polling response shape for this job.
    pub fn to_status_response(&self) -> JobStatusResponse {
        JobStatusResponse {
            job_id: self.job_id.clone(),
            status: self.status,
            progress: self.progress,
            current_step: self.current_step.clone(),
            final_video_url: self.final_video_url.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            segments: self.segments.clone(),
            clips: self.clips.clone(),
        }
    }
}

/// Polling response for job status queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub final_video_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub segments: Vec<Segment>,
    pub clips: Vec<ClipRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> AdJob {
        AdJob::new("user123", "Buy now.", "Buy now.", "user123/j1/character_image.png")
    }

    #[test]
    fn test_job_creation() {
        let job = make_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.character_name, "character");
        assert!((job.verification_threshold - 0.6).abs() < f64::EPSILON);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = make_job();
        job.raise_progress(20);
        assert_eq!(job.progress, 20);
        job.raise_progress(10);
        assert_eq!(job.progress, 20);
        job.raise_progress(60);
        assert_eq!(job.progress, 60);
        job.raise_progress(200);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_completion_pins_progress() {
        let mut job = make_job();
        job.set_status(JobStatus::Finalizing, "Publishing final video");
        job.complete("https://example.com/final.mp4");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.status.is_terminal());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_failure_records_reason() {
        let mut job = make_job();
        job.fail("content_policy");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("content_policy"));
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut job = make_job();
        job.segments.push(Segment {
            index: 0,
            spoken_text: "Buy now.".to_string(),
            visual_prompt: "wide shot of the character".to_string(),
        });
        job.clips.push(crate::ClipRecord::absent(0));

        let json = serde_json::to_string(&job).unwrap();
        let back: AdJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
