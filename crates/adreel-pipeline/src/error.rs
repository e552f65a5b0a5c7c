//! Pipeline error types.

use thiserror::Error;

use adreel_models::JobId;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while driving an ad job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed request; rejected before any state is created.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The planner produced an unusable plan after one corrective retry.
    /// The job fails with no clip work done.
    #[error("Planning failed: {0}")]
    Planning(String),

    /// The video model refused the prompt even with the original character
    /// image as reference.
    #[error("Content policy rejection: {0}")]
    ContentPolicy(String),

    /// A clip exhausted its attempts; the resulting video would have a gap.
    #[error("Clip {index} failed: {reason}")]
    ClipFailed { index: u32, reason: String },

    /// Concatenation or publish failed.
    #[error("Assembly failed: {0}")]
    Assembly(String),

    /// Artifacts exist in storage but the job document has no planner
    /// output. The operator must replay or drop the job.
    #[error("Resume skew: {0}")]
    ResumeSkew(String),

    /// A second orchestrator was requested for a live job.
    #[error("Job {0} already has a running orchestrator")]
    AlreadyRunning(JobId),

    /// Cancellation flag observed at a step or clip boundary.
    #[error("Job cancelled")]
    Cancelled,

    /// A step exceeded its wall-clock budget.
    #[error("Step '{0}' timed out")]
    StepTimeout(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] adreel_storage::StorageError),

    #[error("Job store error: {0}")]
    Store(#[from] adreel_firestore::FirestoreError),

    #[error("Mux error: {0}")]
    Media(#[from] adreel_media::MediaError),

    #[error("Engine error: {0}")]
    Engine(#[from] adreel_engine::EngineError),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    pub fn resume_skew(msg: impl Into<String>) -> Self {
        Self::ResumeSkew(msg.into())
    }

    /// Short machine-readable reason recorded on the failed job document.
    pub fn failure_reason(&self) -> String {
        match self {
            PipelineError::Validation(_) => "validation".to_string(),
            PipelineError::Planning(_) => "planning".to_string(),
            PipelineError::ContentPolicy(_) => "content_policy".to_string(),
            PipelineError::ClipFailed { index, .. } => format!("clip_{index}_failed"),
            PipelineError::Assembly(_) => "assembly".to_string(),
            PipelineError::ResumeSkew(_) => "resume_skew".to_string(),
            PipelineError::AlreadyRunning(_) => "already_running".to_string(),
            PipelineError::Cancelled => "cancelled".to_string(),
            PipelineError::StepTimeout(step) => format!("{step}_timeout"),
            PipelineError::Storage(_) => "storage".to_string(),
            PipelineError::Store(_) => "job_store".to_string(),
            PipelineError::Media(_) => "mux".to_string(),
            PipelineError::Engine(_) => "engine".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reasons() {
        assert_eq!(PipelineError::Cancelled.failure_reason(), "cancelled");
        assert_eq!(
            PipelineError::ClipFailed { index: 2, reason: "x".into() }.failure_reason(),
            "clip_2_failed"
        );
        assert_eq!(
            PipelineError::ContentPolicy("nope".into()).failure_reason(),
            "content_policy"
        );
        assert_eq!(PipelineError::StepTimeout("planning").failure_reason(), "planning_timeout");
    }
}
