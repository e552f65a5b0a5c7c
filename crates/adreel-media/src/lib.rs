//! FFmpeg CLI wrapper for ad assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with stderr capture
//! - Clip concatenation over HTTPS inputs (no local downloads)
//! - Audio-track replacement
//! - Last-frame extraction for continuity conditioning
//! - Duration probing via ffprobe
//!
//! Every invocation is a separate subprocess with no shared state. Inputs
//! may be local paths or presigned HTTPS URLs; outputs are always local
//! files inside a job-scoped scratch directory that is deleted on drop.

pub mod assemble;
pub mod command;
pub mod error;
pub mod frame;
pub mod probe;
pub mod scratch;

pub use assemble::{concat_clips, replace_audio_track};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frame::extract_last_frame;
pub use probe::probe_duration;
pub use scratch::ScratchDir;
