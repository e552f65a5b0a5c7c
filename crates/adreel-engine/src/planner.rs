//! LLM script planner adapter.
//!
//! Calls a Gemini-style generateContent endpoint in strict-JSON mode and
//! parses the returned shot list.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::budget::RateBudget;
use crate::error::{EngineError, EngineResult};
use crate::traits::{PlannedShot, ScriptPlanner};

/// Configuration for the planner client.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// generateContent endpoint URL
    pub endpoint: String,
    /// API key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Requests per minute budget
    pub requests_per_minute: u32,
}

impl PlannerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Ok(Self {
            endpoint: std::env::var("PLANNER_ENDPOINT")
                .map_err(|_| EngineError::config("PLANNER_ENDPOINT not set"))?,
            api_key: std::env::var("PLANNER_API_KEY")
                .map_err(|_| EngineError::config("PLANNER_API_KEY not set"))?,
            timeout: Duration::from_secs(120),
            requests_per_minute: std::env::var("PLANNER_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }
}

/// Planner API request.
#[derive(Debug, Serialize)]
struct PlanRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Planner API response.
#[derive(Debug, Deserialize)]
struct PlanResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Shot list shape the model is asked to return.
#[derive(Debug, Deserialize)]
struct ShotList {
    shots: Vec<PlannedShot>,
}

/// HTTP planner client.
pub struct PlannerClient {
    config: PlannerConfig,
    http: Client,
    budget: RateBudget,
}

impl PlannerClient {
    /// Create a new planner client.
    pub fn new(config: PlannerConfig) -> EngineResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(EngineError::from)?;
        let budget = RateBudget::per_minute("planner", config.requests_per_minute);
        Ok(Self {
            config,
            http,
            budget,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(PlannerConfig::from_env()?)
    }

    fn build_prompt(
        script: &str,
        character_name: &str,
        target_seconds_per_clip: u32,
        correction: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "Split this advertisement script into shots of roughly {target_seconds_per_clip} \
             seconds of speech each. Return JSON of the form \
             {{\"shots\": [{{\"spoken_text\": \"...\", \"visual_prompt\": \"...\"}}]}}.\n\
             Rules:\n\
             - The concatenation of all spoken_text values must reproduce the script \
               verbatim, in order, with nothing added or dropped.\n\
             - Each visual_prompt describes camera framing, what {character_name} is doing, \
               and the setting. Never include the spoken line in the visual_prompt.\n\
             - Keep {character_name}'s appearance consistent across shots.\n\n\
             Script:\n{script}"
        );
        if let Some(correction) = correction {
            prompt.push_str("\n\nCorrection: ");
            prompt.push_str(correction);
        }
        prompt
    }

    /// Strip optional markdown fences the model wraps around JSON output.
    fn strip_fences(text: &str) -> &str {
        let text = text.trim();
        let text = text.strip_prefix("```json").unwrap_or(text);
        let text = text.strip_prefix("```").unwrap_or(text);
        let text = text.strip_suffix("```").unwrap_or(text);
        text.trim()
    }
}

#[async_trait]
impl ScriptPlanner for PlannerClient {
    async fn plan(
        &self,
        script: &str,
        character_name: &str,
        target_seconds_per_clip: u32,
        correction: Option<&str>,
    ) -> EngineResult<Vec<PlannedShot>> {
        self.budget.try_acquire()?;

        let request = PlanRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::build_prompt(script, character_name, target_seconds_per_clip, correction),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        debug!("Requesting shot plan ({} chars of script)", script.len());

        let response = self
            .http
            .post(&self.config.endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status, body));
        }

        let parsed: PlanResponse = response.json().await?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| EngineError::planning("planner returned no candidates"))?;

        let shots: ShotList = serde_json::from_str(Self::strip_fences(text))
            .map_err(|e| EngineError::planning(format!("unparseable shot list: {e}")))?;

        if shots.shots.is_empty() {
            return Err(EngineError::planning("planner returned an empty shot list"));
        }

        metrics::counter!("engine_requests_total", "adapter" => "planner").increment(1);
        Ok(shots.shots)
    }
}
