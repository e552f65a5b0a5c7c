//! Ad creation request DTO.

use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::{AspectRatio, Resolution};

/// Error decoding the character image payload.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("character_image is empty")]
    Empty,

    #[error("Invalid base64 in character_image: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Request body for ad creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CreateAdRequest {
    /// Ad script; must be non-empty after normalization
    #[validate(length(min = 1, message = "script must not be empty"))]
    pub script: String,

    /// Character reference image: a base64 data URI or raw base64 bytes
    #[validate(length(min = 1, message = "character_image is required"))]
    pub character_image: String,

    /// Name used for the character in visual prompts
    #[serde(default = "default_character_name")]
    pub character_name: String,

    /// Voice identity for speech synthesis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// Target aspect ratio, default 16:9
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Target resolution, default 720p
    #[serde(default)]
    pub resolution: Resolution,

    /// Run vision verification after each clip
    #[serde(default)]
    pub enable_verification: bool,

    /// Verification confidence threshold
    #[serde(default = "default_verification_threshold")]
    #[validate(range(min = 0.0, max = 1.0, message = "verification_threshold must be in [0, 1]"))]
    pub verification_threshold: f64,

    /// Campaign this ad belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

fn default_character_name() -> String {
    "character".to_string()
}

fn default_verification_threshold() -> f64 {
    0.6
}

impl CreateAdRequest {
    /// Decode the character image into raw bytes.
    ///
    /// Accepts both `data:image/png;base64,...` URIs and bare base64. The
    /// data-URI prefix is stripped; only the decoded bytes are kept.
    pub fn decode_character_image(&self) -> Result<Vec<u8>, ImageDecodeError> {
        let payload = match self.character_image.split_once(";base64,") {
            Some((_, b64)) => b64,
            None => self.character_image.as_str(),
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ImageDecodeError::Empty);
        }
        Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
    }
}
