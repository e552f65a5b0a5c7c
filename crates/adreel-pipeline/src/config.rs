//! Pipeline configuration.

use std::time::Duration;

use adreel_engine::BackoffConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target seconds of speech per clip, fed to the planner
    pub target_seconds_per_clip: u32,
    /// Transient generation attempts per clip
    pub max_transient_attempts: u32,
    /// Planning step timeout
    pub planning_timeout: Duration,
    /// Per-clip generation timeout
    pub clip_timeout: Duration,
    /// Whole-job wall-clock timeout
    pub job_timeout: Duration,
    /// Whether assembly replaces the audio track with synthesized speech
    pub enable_voice_enhancement: bool,
    /// Backoff for retryable external calls (delay capped at 30 s)
    pub backoff: BackoffConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_seconds_per_clip: 7,
            max_transient_attempts: 3,
            planning_timeout: Duration::from_secs(120),
            clip_timeout: Duration::from_secs(600),
            job_timeout: Duration::from_secs(3600),
            enable_voice_enhancement: true,
            backoff: BackoffConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            target_seconds_per_clip: std::env::var("PIPELINE_CLIP_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
            max_transient_attempts: std::env::var("PIPELINE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            planning_timeout: Duration::from_secs(
                std::env::var("PIPELINE_PLANNING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            clip_timeout: Duration::from_secs(
                std::env::var("PIPELINE_CLIP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            job_timeout: Duration::from_secs(
                std::env::var("PIPELINE_JOB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            enable_voice_enhancement: std::env::var("PIPELINE_VOICE_ENHANCEMENT")
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(true),
            backoff: BackoffConfig::default(),
        }
    }
}
