//! Collaborator contracts the orchestrator drives.
//!
//! Object storage, the job store and the mux tool sit behind narrow traits
//! so the step logic stays independent of the concrete backends.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use adreel_models::{AdJob, JobId};
use adreel_storage::ArtifactPaths;

use crate::error::PipelineResult;

/// Content-addressed artifact blob I/O.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Idempotent overwrite; partial writes are never visible to readers.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> PipelineResult<()>;

    /// Fetch an artifact. `StorageError::NotFound` maps through the error
    /// chain for missing keys.
    async fn get(&self, key: &str) -> PipelineResult<Vec<u8>>;

    /// Indices of positive-size clip artifacts under the job, for the
    /// recovery scan.
    async fn existing_clip_indices(&self, paths: &ArtifactPaths) -> PipelineResult<BTreeSet<u32>>;

    /// Time-bounded HTTPS URL readable by external tools (mux inputs,
    /// client delivery).
    async fn signed_url(&self, key: &str, ttl: Duration) -> PipelineResult<String>;
}

/// Durable document-per-job storage.
///
/// `save` is last-writer-wins; the orchestrator is the sole writer per job
/// so no further coordination is required.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(&self, job: &AdJob) -> PipelineResult<()>;
    async fn load(&self, user_id: &str, job_id: &JobId) -> PipelineResult<Option<AdJob>>;
}

/// The local video mux tool (ffmpeg subprocess boundary).
///
/// Each invocation is a separate process with no shared state. Failures
/// carry the tool's captured stderr.
#[async_trait]
pub trait MuxTool: Send + Sync {
    /// Concatenate clips referenced by HTTPS URL into one video.
    async fn concat(&self, clip_urls: &[String]) -> PipelineResult<Vec<u8>>;

    /// Replace the audio track of `video` with `audio`.
    async fn replace_audio(&self, video: &[u8], audio: &[u8]) -> PipelineResult<Vec<u8>>;

    /// Extract the last frame of `video` as a PNG.
    async fn extract_last_frame(&self, video: &[u8]) -> PipelineResult<Vec<u8>>;

    /// Probe the duration of `video` in seconds, when determinable.
    async fn probe_duration(&self, video: &[u8]) -> PipelineResult<Option<f64>>;
}
