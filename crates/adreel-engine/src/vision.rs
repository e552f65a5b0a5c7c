//! Vision verification adapter.
//!
//! Scores a produced clip against its segment text. The score is an
//! observation recorded on the clip; it never drives regeneration.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::budget::RateBudget;
use crate::error::{EngineError, EngineResult};
use crate::traits::{VerificationOutcome, VisionVerifier};

/// Configuration for the vision client.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Verification endpoint URL
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Requests per minute budget
    pub requests_per_minute: u32,
}

impl VisionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Ok(Self {
            endpoint: std::env::var("VISION_ENDPOINT")
                .map_err(|_| EngineError::config("VISION_ENDPOINT not set"))?,
            api_key: std::env::var("VISION_API_KEY")
                .map_err(|_| EngineError::config("VISION_API_KEY not set"))?,
            timeout: Duration::from_secs(120),
            requests_per_minute: std::env::var("VISION_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
        })
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    /// Base64-encoded clip
    video: String,
    expected_speech: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    confidence: f64,
    #[serde(default)]
    visual_description: String,
    #[serde(default)]
    feedback: String,
}

/// HTTP vision verification client.
pub struct VisionClient {
    config: VisionConfig,
    http: Client,
    budget: RateBudget,
}

impl VisionClient {
    /// Create a new vision client.
    pub fn new(config: VisionConfig) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EngineError::from)?;
        let budget = RateBudget::per_minute("vision", config.requests_per_minute);
        Ok(Self {
            config,
            http,
            budget,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(VisionConfig::from_env()?)
    }
}

#[async_trait]
impl VisionVerifier for VisionClient {
    async fn verify(
        &self,
        clip_bytes: &[u8],
        spoken_text: &str,
    ) -> EngineResult<VerificationOutcome> {
        self.budget.try_acquire()?;

        debug!("Verifying clip ({} bytes)", clip_bytes.len());

        let request = VerifyRequest {
            video: base64::engine::general_purpose::STANDARD.encode(clip_bytes),
            expected_speech: spoken_text,
        };

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status, body));
        }

        let parsed: VerifyResponse = response.json().await?;
        metrics::counter!("engine_requests_total", "adapter" => "vision").increment(1);

        Ok(VerificationOutcome {
            confidence: parsed.confidence.clamp(0.0, 1.0),
            visual_description: parsed.visual_description,
            feedback: parsed.feedback,
        })
    }
}
