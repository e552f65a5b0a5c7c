//! Application state.

use std::sync::Arc;

use adreel_engine::{
    PlannerClient, SpeechClient, VideoEngineClient, VisionClient, VisionVerifier,
};
use adreel_firestore::FirestoreClient;
use adreel_pipeline::{
    FfmpegMux, FirestoreJobStore, JobRegistry, PipelineConfig, PipelineContext, R2ArtifactStore,
};
use adreel_storage::R2Client;
use tracing::info;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<R2Client>,
    pub firestore: Arc<FirestoreClient>,
    pub pipeline: PipelineContext,
    pub registry: JobRegistry,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = Arc::new(R2Client::from_env().await?);
        let firestore = Arc::new(FirestoreClient::from_env().await?);

        // The vision verifier is deployment-optional; verification is also
        // gated per job by enable_verification.
        let vision: Option<Arc<dyn VisionVerifier>> = match VisionClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                info!("Vision verifier not configured ({}), verification disabled", e);
                None
            }
        };

        let pipeline = PipelineContext {
            config: PipelineConfig::from_env(),
            artifacts: Arc::new(R2ArtifactStore::new((*storage).clone())),
            jobs: Arc::new(FirestoreJobStore::new((*firestore).clone())),
            mux: Arc::new(FfmpegMux::new()),
            planner: Arc::new(PlannerClient::from_env()?),
            video: Arc::new(VideoEngineClient::from_env()?),
            speech: Arc::new(SpeechClient::from_env()?),
            vision,
        };

        Ok(Self {
            config,
            storage,
            firestore,
            pipeline,
            registry: JobRegistry::new(),
        })
    }
}
