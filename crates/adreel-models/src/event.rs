//! Progress event schemas for the SSE stream.
//!
//! Each variant maps to one named SSE event; `name()` supplies the
//! `event:` line and the serialized variant body supplies the `data:`
//! payload. The stream is terminated by `complete` or `error`; nothing is
//! emitted after a terminal event.

use serde::Serialize;

use crate::progress::clip_progress;
use crate::JobId;

/// One progress event on the ad creation stream.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AdEvent {
    /// `step1` / `step1_complete` / `step3` / `step4` / `step5`
    Step {
        step: u8,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_clips: Option<u32>,
        progress: u8,
        #[serde(skip)]
        name: &'static str,
    },

    /// `step2_clip`, emitted after each clip completes
    ClipProgress {
        step: u8,
        message: String,
        current_clip: u32,
        total_clips: u32,
        progress: u8,
    },

    /// `complete`, the successful terminal event
    Complete {
        status: &'static str,
        final_video_url: String,
        job_id: JobId,
    },

    /// `error`, the failing terminal event; the stream closes after it
    Error { message: String },
}

impl AdEvent {
    /// Planning started.
    pub fn planning_started() -> Self {
        AdEvent::Step {
            step: 1,
            message: "Breaking script into shots".to_string(),
            total_clips: None,
            progress: 10,
            name: "step1",
        }
    }

    /// Planning finished with `total` clips to produce.
    pub fn planning_complete(total: u32) -> Self {
        AdEvent::Step {
            step: 1,
            message: format!("Planned {total} clips"),
            total_clips: Some(total),
            progress: 20,
            name: "step1_complete",
        }
    }

    /// Clip `current` of `total` finished (1-based for display).
    pub fn clip_completed(current: u32, total: u32) -> Self {
        AdEvent::ClipProgress {
            step: 2,
            message: format!("Generated clip {current}/{total}"),
            current_clip: current,
            total_clips: total,
            progress: clip_progress(current as usize, total as usize),
        }
    }

    /// Concatenation started.
    pub fn merging() -> Self {
        AdEvent::Step {
            step: 3,
            message: "Merging clips".to_string(),
            total_clips: None,
            progress: 60,
            name: "step3",
        }
    }

    /// Voice enhancement started. Skipped entirely when disabled.
    pub fn enhancing_voice() -> Self {
        AdEvent::Step {
            step: 4,
            message: "Enhancing voice track".to_string(),
            total_clips: None,
            progress: 80,
            name: "step4",
        }
    }

    /// Final publish started.
    pub fn finalizing() -> Self {
        AdEvent::Step {
            step: 5,
            message: "Publishing final video".to_string(),
            total_clips: None,
            progress: 95,
            name: "step5",
        }
    }

    /// Successful terminal event.
    pub fn complete(job_id: JobId, final_video_url: impl Into<String>) -> Self {
        AdEvent::Complete {
            status: "completed",
            final_video_url: final_video_url.into(),
            job_id,
        }
    }

    /// Failing terminal event.
    pub fn error(message: impl Into<String>) -> Self {
        AdEvent::Error {
            message: message.into(),
        }
    }

    /// The SSE event name for this event.
    pub fn name(&self) -> &'static str {
        match self {
            AdEvent::Step { name, .. } => name,
            AdEvent::ClipProgress { .. } => "step2_clip",
            AdEvent::Complete { .. } => "complete",
            AdEvent::Error { .. } => "error",
        }
    }

    /// True for events after which nothing more may be emitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdEvent::Complete { .. } | AdEvent::Error { .. })
    }
}
