//! Cloudflare R2 artifact store.
//!
//! This crate provides:
//! - Artifact upload/download to R2
//! - Presigned URL generation (ffmpeg HTTPS input, final delivery)
//! - The canonical ad artifact layout under `{user_id}/{job_id}/`
//! - Clip listing for the recovery scan

pub mod client;
pub mod error;
pub mod paths;

pub use client::{ObjectInfo, R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use paths::ArtifactPaths;

/// Presign TTL for mux-tool inputs (concat reads clips over HTTPS).
pub const MUX_INPUT_URL_TTL: std::time::Duration = std::time::Duration::from_secs(2 * 60 * 60);

/// Presign TTL for the published final video. Seven days is the S3 presign
/// ceiling.
pub const PUBLISH_URL_TTL: std::time::Duration = std::time::Duration::from_secs(7 * 24 * 60 * 60);
