//! Capability contracts the pipeline consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use adreel_models::{AspectRatio, Resolution};

use crate::error::EngineResult;

/// One planned shot: the spoken line paired with its visual prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedShot {
    /// Verbatim subset of the normalized script
    pub spoken_text: String,
    /// Camera framing, subject action and setting. Must not repeat the
    /// spoken line; the line is delivered separately for lip-sync.
    pub visual_prompt: String,
}

/// Input to one video generation call.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Visual prompt for this shot
    pub prompt: String,
    /// The line the character speaks (drives lip-sync)
    pub spoken_text: String,
    /// Conditioning image: the character image or the previous clip's
    /// continuity frame
    pub reference_image: Vec<u8>,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
}

/// Confidence observation from the vision verifier.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// Confidence in [0, 1] that the clip matches its segment
    pub confidence: f64,
    pub visual_description: String,
    pub feedback: String,
}

/// Splits a script into ordered, shot-sized units.
#[async_trait]
pub trait ScriptPlanner: Send + Sync {
    /// Plan the script into `(spoken line, visual prompt)` pairs.
    ///
    /// `correction` carries a corrective instruction on the re-prompt after
    /// a coverage violation; `None` on the first attempt.
    async fn plan(
        &self,
        script: &str,
        character_name: &str,
        target_seconds_per_clip: u32,
        correction: Option<&str>,
    ) -> EngineResult<Vec<PlannedShot>>;
}

/// Generates one video clip from a prompt and a conditioning image.
///
/// A single call polls the backing long-running operation until terminal
/// and may block for up to ten minutes.
#[async_trait]
pub trait VideoEngine: Send + Sync {
    async fn generate(&self, input: &GenerationInput) -> EngineResult<Vec<u8>>;
}

/// Synthesizes speech for the full script.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> EngineResult<Vec<u8>>;
}

/// Scores a produced clip against its segment text.
#[async_trait]
pub trait VisionVerifier: Send + Sync {
    async fn verify(&self, clip_bytes: &[u8], spoken_text: &str) -> EngineResult<VerificationOutcome>;
}
