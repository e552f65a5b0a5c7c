//! Text-to-video engine adapter.
//!
//! Submits a generation request as a long-running operation and polls it
//! until terminal. A single `generate` call may block for up to ten
//! minutes; the caller owns any outer timeout.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::budget::RateBudget;
use crate::error::{EngineError, EngineResult};
use crate::traits::{GenerationInput, VideoEngine};

/// Configuration for the video engine client.
#[derive(Debug, Clone)]
pub struct VideoEngineConfig {
    /// Base URL of the video generation API
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Delay between operation polls
    pub poll_interval: Duration,
    /// Give up polling after this long
    pub poll_deadline: Duration,
    /// Requests per minute budget
    pub requests_per_minute: u32,
}

impl VideoEngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Ok(Self {
            base_url: std::env::var("VIDEO_ENGINE_URL")
                .map_err(|_| EngineError::config("VIDEO_ENGINE_URL not set"))?,
            api_key: std::env::var("VIDEO_ENGINE_API_KEY")
                .map_err(|_| EngineError::config("VIDEO_ENGINE_API_KEY not set"))?,
            poll_interval: Duration::from_secs(
                std::env::var("VIDEO_ENGINE_POLL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            poll_deadline: Duration::from_secs(600),
            requests_per_minute: std::env::var("VIDEO_ENGINE_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        })
    }
}

/// Generation submission request.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    prompt: String,
    spoken_text: String,
    /// Base64-encoded conditioning image
    reference_image: String,
    aspect_ratio: String,
    resolution: String,
}

/// Submission response: a long-running operation handle.
#[derive(Debug, Deserialize)]
struct OperationHandle {
    name: String,
}

/// Operation poll response.
#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    /// Base64-encoded video bytes
    #[serde(default)]
    video: Option<String>,
    /// Set when the safety filter blocked the generation
    #[serde(default)]
    filtered_reason: Option<String>,
}

/// HTTP video engine client.
pub struct VideoEngineClient {
    config: VideoEngineConfig,
    http: Client,
    budget: RateBudget,
}

impl VideoEngineClient {
    /// Create a new video engine client.
    pub fn new(config: VideoEngineConfig) -> EngineResult<Self> {
        // No overall request timeout here: the submit call is fast, and
        // polling applies its own deadline.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(EngineError::from)?;
        let budget = RateBudget::per_minute("video_engine", config.requests_per_minute);
        Ok(Self {
            config,
            http,
            budget,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(VideoEngineConfig::from_env()?)
    }

    async fn submit(&self, input: &GenerationInput) -> EngineResult<String> {
        let request = GenerateRequest {
            prompt: input.prompt.clone(),
            spoken_text: input.spoken_text.clone(),
            reference_image: base64::engine::general_purpose::STANDARD.encode(&input.reference_image),
            aspect_ratio: input.aspect_ratio.as_str().to_string(),
            resolution: input.resolution.as_str().to_string(),
        };

        let url = format!("{}/v1/videos:generate", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_submit_failure(status, body));
        }

        let handle: OperationHandle = response.json().await?;
        debug!("Submitted generation operation {}", handle.name);
        Ok(handle.name)
    }

    async fn poll(&self, operation_name: &str) -> EngineResult<Vec<u8>> {
        let url = format!("{}/v1/{}", self.config.base_url, operation_name);
        let started = Instant::now();

        loop {
            if started.elapsed() > self.config.poll_deadline {
                return Err(EngineError::Timeout(self.config.poll_deadline.as_secs()));
            }

            tokio::time::sleep(self.config.poll_interval).await;

            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EngineError::from_status(status, body));
            }

            let op: Operation = response.json().await?;
            if !op.done {
                debug!("Operation {} still running", operation_name);
                continue;
            }

            if let Some(err) = op.error {
                return Err(classify_operation_error(&err));
            }

            let response = op
                .response
                .ok_or_else(|| EngineError::invalid_response("operation done with no response"))?;

            if let Some(reason) = response.filtered_reason {
                return Err(EngineError::rejected(reason));
            }

            let video_b64 = response
                .video
                .ok_or_else(|| EngineError::invalid_response("operation response has no video"))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(video_b64.as_bytes())
                .map_err(|e| EngineError::invalid_response(format!("bad video base64: {e}")))?;

            if bytes.is_empty() {
                return Err(EngineError::invalid_response("engine returned empty video"));
            }

            info!(
                "Generation operation {} finished ({} bytes)",
                operation_name,
                bytes.len()
            );
            return Ok(bytes);
        }
    }
}

/// Classify a submission failure. Safety blocks arrive as 400s carrying a
/// policy marker; everything 429/5xx is transient.
fn classify_submit_failure(status: reqwest::StatusCode, body: String) -> EngineError {
    if status.as_u16() == 400 && is_policy_block(&body) {
        return EngineError::rejected(body);
    }
    EngineError::from_status(status, body)
}

fn classify_operation_error(err: &OperationError) -> EngineError {
    if is_policy_block(&err.message) || is_policy_block(&err.status) {
        return EngineError::rejected(err.message.clone());
    }
    // gRPC-style codes: UNAVAILABLE=14, RESOURCE_EXHAUSTED=8, DEADLINE_EXCEEDED=4
    if matches!(err.code, 4 | 8 | 14) {
        return EngineError::transient(err.message.clone());
    }
    EngineError::invalid_response(format!("operation failed ({}): {}", err.code, err.message))
}

fn is_policy_block(text: &str) -> bool {
    let text = text.to_ascii_lowercase();
    text.contains("safety") || text.contains("content policy") || text.contains("blocked")
}

#[async_trait]
impl VideoEngine for VideoEngineClient {
    async fn generate(&self, input: &GenerationInput) -> EngineResult<Vec<u8>> {
        self.budget.try_acquire()?;
        metrics::counter!("engine_requests_total", "adapter" => "video_engine").increment(1);

        let operation_name = self.submit(input).await?;
        self.poll(&operation_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_block_is_rejection() {
        let err = classify_submit_failure(
            reqwest::StatusCode::BAD_REQUEST,
            "request blocked by safety filter".to_string(),
        );
        assert!(matches!(err, EngineError::Rejected(_)));
    }

    #[test]
    fn test_plain_bad_request_is_not_rejection() {
        let err = classify_submit_failure(
            reqwest::StatusCode::BAD_REQUEST,
            "missing field prompt".to_string(),
        );
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }

    #[test]
    fn test_operation_unavailable_is_transient() {
        let err = classify_operation_error(&OperationError {
            code: 14,
            message: "upstream unavailable".to_string(),
            status: "UNAVAILABLE".to_string(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_operation_safety_error_is_rejection() {
        let err = classify_operation_error(&OperationError {
            code: 3,
            message: "generation blocked: safety".to_string(),
            status: "INVALID_ARGUMENT".to_string(),
        });
        assert!(matches!(err, EngineError::Rejected(_)));
    }
}
