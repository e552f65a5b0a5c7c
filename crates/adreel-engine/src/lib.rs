//! HTTP adapters for the external generation models.
//!
//! Four narrow capability contracts back the pipeline:
//! - `ScriptPlanner` - script → ordered (spoken line, visual prompt) pairs
//! - `VideoEngine` - prompt + reference image → video bytes, polling the
//!   backing long-running operation to terminal
//! - `SpeechEngine` - text → synthesized audio bytes
//! - `VisionVerifier` - clip + spoken line → confidence observation
//!
//! Content-policy denial (`EngineError::Rejected`) is distinct from
//! transient failure; only the latter is retried. Each adapter holds a
//! per-process rate budget; an exhausted budget surfaces as transient and
//! goes through the same bounded backoff.

pub mod budget;
pub mod error;
pub mod planner;
pub mod retry;
pub mod speech;
pub mod traits;
pub mod video;
pub mod vision;

pub use budget::RateBudget;
pub use error::{EngineError, EngineResult};
pub use planner::{PlannerClient, PlannerConfig};
pub use retry::{with_backoff, BackoffConfig};
pub use speech::{SpeechClient, SpeechConfig};
pub use traits::{
    GenerationInput, PlannedShot, ScriptPlanner, SpeechEngine, VerificationOutcome, VideoEngine,
    VisionVerifier,
};
pub use video::{VideoEngineClient, VideoEngineConfig};
pub use vision::{VisionClient, VisionConfig};
