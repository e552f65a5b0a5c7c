//! Shared data models for the AdReel backend.
//!
//! This crate provides Serde-serializable types for:
//! - Ad jobs, segments and clip records
//! - Job and clip status enums
//! - Aspect ratio / resolution formats
//! - Progress accounting across pipeline phases
//! - SSE progress event schemas (event.rs, consumed by the API stream writer)
//! - Request/response DTOs with validation
//! - Script normalization

pub mod clip;
pub mod event;
pub mod format;
pub mod job;
pub mod normalize;
pub mod progress;
pub mod request;
pub mod segment;

// Re-export common types
pub use clip::{ClipRecord, ClipStatus, VerificationRecord};
pub use event::AdEvent;
pub use format::{AspectRatio, FormatParseError, Resolution};
pub use job::{AdJob, JobId, JobStatus, JobStatusResponse};
pub use normalize::normalize_script;
pub use progress::{clip_progress, PROGRESS_CLIPS_DONE, PROGRESS_COMPLETE, PROGRESS_MERGED, PROGRESS_PLANNED, PROGRESS_VOICED};
pub use request::{CreateAdRequest, ImageDecodeError};
pub use segment::{segments_cover_script, Segment};
