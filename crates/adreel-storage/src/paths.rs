//! Canonical artifact layout for one ad job.
//!
//! Every artifact lives under `{user_id}/{job_id}/`. The paths are stable:
//! the recovery scan, auditing, and the mux tool all key off them.

use adreel_models::JobId;

/// Canonical object keys for one job's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    prefix: String,
}

impl ArtifactPaths {
    /// Build the path set for a job.
    pub fn new(user_id: &str, job_id: &JobId) -> Self {
        Self {
            prefix: format!("{}/{}", user_id, job_id),
        }
    }

    /// Job key prefix (`{user_id}/{job_id}`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The uploaded character reference image.
    pub fn character_image(&self) -> String {
        format!("{}/character_image.png", self.prefix)
    }

    /// One clip artifact.
    pub fn clip(&self, index: u32) -> String {
        format!("{}/clips/clip_{}.mp4", self.prefix, index)
    }

    /// Prefix of all clip artifacts, for the recovery scan.
    pub fn clips_prefix(&self) -> String {
        format!("{}/clips/", self.prefix)
    }

    /// Persisted visual prompt for one clip (audit/recovery).
    pub fn prompt(&self, index: u32) -> String {
        format!("{}/prompts/prompt_{}.txt", self.prefix, index)
    }

    /// Concatenated video before voice enhancement.
    pub fn merged(&self) -> String {
        format!("{}/merged.mp4", self.prefix)
    }

    /// The published final video.
    pub fn final_video(&self) -> String {
        format!("{}/final.mp4", self.prefix)
    }

    /// Parse a clip index out of a full clip key.
    ///
    /// Returns `None` for keys that are not canonical clip artifacts.
    pub fn parse_clip_index(key: &str) -> Option<u32> {
        let filename = key.rsplit('/').next()?;
        let stem = filename.strip_prefix("clip_")?.strip_suffix(".mp4")?;
        stem.parse().ok()
    }
}
