//! Shared context for pipeline execution.

use std::sync::Arc;

use adreel_engine::{ScriptPlanner, SpeechEngine, VideoEngine, VisionVerifier};

use crate::config::PipelineConfig;
use crate::traits::{ArtifactStore, JobStore, MuxTool};

/// Everything one orchestrator task needs to drive a job.
///
/// Cloning is cheap; all collaborators are shared handles. The vision
/// verifier is optional at the deployment level and additionally gated per
/// job by `enable_verification`.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub jobs: Arc<dyn JobStore>,
    pub mux: Arc<dyn MuxTool>,
    pub planner: Arc<dyn ScriptPlanner>,
    pub video: Arc<dyn VideoEngine>,
    pub speech: Arc<dyn SpeechEngine>,
    pub vision: Option<Arc<dyn VisionVerifier>>,
}
