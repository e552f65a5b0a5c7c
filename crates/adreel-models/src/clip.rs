//! Per-clip production records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// State of one clip in the production loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// No artifact and no generation attempt yet
    #[default]
    Absent,
    /// A generation call is in flight
    Generating,
    /// Artifact produced and uploaded this run
    Completed,
    /// Generation exhausted its attempts
    Failed,
    /// Artifact existed at job start and was adopted without regeneration
    Recovered,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Absent => "absent",
            ClipStatus::Generating => "generating",
            ClipStatus::Completed => "completed",
            ClipStatus::Failed => "failed",
            ClipStatus::Recovered => "recovered",
        }
    }

    /// True when a readable artifact exists for this clip.
    pub fn has_artifact(&self) -> bool {
        matches!(self, ClipStatus::Completed | ClipStatus::Recovered)
    }
}

/// Outcome of the optional vision verification pass.
///
/// Verification is an observation, not a control signal: a failed check is
/// recorded on the clip but does not trigger regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VerificationRecord {
    /// Model confidence that the clip matches its segment, in [0, 1]
    pub confidence: f64,
    /// What the model saw in the clip
    pub visual_description: String,
    /// Model feedback on mismatches
    pub feedback: String,
    /// Whether confidence cleared the job's threshold
    pub passed: bool,
}

/// One produced video clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipRecord {
    /// Clip index, matching the segment index
    pub index: u32,

    /// Current production state
    #[serde(default)]
    pub status: ClipStatus,

    /// Canonical artifact key in object storage, set on completed/recovered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,

    /// Probed duration, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    /// Generation attempts beyond the first (transient retries and the
    /// content-policy fallback both count)
    #[serde(default)]
    pub retry_count: u32,

    /// Vision verification outcome, when verification is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationRecord>,
}

impl ClipRecord {
    /// Create a record for a clip that has not been attempted.
    pub fn absent(index: u32) -> Self {
        Self {
            index,
            status: ClipStatus::Absent,
            artifact_url: None,
            duration_seconds: None,
            retry_count: 0,
            verification: None,
        }
    }

    /// Adopt an artifact found during the recovery scan.
    pub fn recovered(index: u32, artifact_url: impl Into<String>) -> Self {
        Self {
            index,
            status: ClipStatus::Recovered,
            artifact_url: Some(artifact_url.into()),
            duration_seconds: None,
            retry_count: 0,
            verification: None,
        }
    }

    /// Mark the clip completed with its uploaded artifact.
    pub fn complete(&mut self, artifact_url: impl Into<String>, duration_seconds: Option<f64>) {
        self.status = ClipStatus::Completed;
        self.artifact_url = Some(artifact_url.into());
        self.duration_seconds = duration_seconds;
    }

    /// Mark the clip failed.
    pub fn fail(&mut self) {
        self.status = ClipStatus::Failed;
        self.artifact_url = None;
    }
}
