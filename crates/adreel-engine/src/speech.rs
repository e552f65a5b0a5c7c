//! Text-to-speech adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::budget::RateBudget;
use crate::error::{EngineError, EngineResult};
use crate::traits::SpeechEngine;

/// Configuration for the speech client.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Synthesis endpoint URL
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Default voice when the job does not pick one
    pub default_voice: String,
    /// Requests per minute budget
    pub requests_per_minute: u32,
}

impl SpeechConfig {
    /// Create config from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Ok(Self {
            endpoint: std::env::var("SPEECH_ENDPOINT")
                .map_err(|_| EngineError::config("SPEECH_ENDPOINT not set"))?,
            api_key: std::env::var("SPEECH_API_KEY")
                .map_err(|_| EngineError::config("SPEECH_API_KEY not set"))?,
            timeout: Duration::from_secs(180),
            default_voice: std::env::var("SPEECH_DEFAULT_VOICE")
                .unwrap_or_else(|_| "narrator".to_string()),
            requests_per_minute: std::env::var("SPEECH_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
        })
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    output_format: &'a str,
}

/// HTTP speech synthesis client.
pub struct SpeechClient {
    config: SpeechConfig,
    http: Client,
    budget: RateBudget,
}

impl SpeechClient {
    /// Create a new speech client.
    pub fn new(config: SpeechConfig) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EngineError::from)?;
        let budget = RateBudget::per_minute("speech", config.requests_per_minute);
        Ok(Self {
            config,
            http,
            budget,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(SpeechConfig::from_env()?)
    }
}

#[async_trait]
impl SpeechEngine for SpeechClient {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> EngineResult<Vec<u8>> {
        self.budget.try_acquire()?;

        let voice = voice_id.unwrap_or(&self.config.default_voice);
        debug!("Synthesizing {} chars with voice {}", text.len(), voice);

        let request = SynthesizeRequest {
            text,
            voice_id: voice,
            output_format: "mp3",
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

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(EngineError::invalid_response("speech engine returned no audio"));
        }

        metrics::counter!("engine_requests_total", "adapter" => "speech").increment(1);
        Ok(bytes)
    }
}
