//! Planned script segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One shot's dialogue plus visual instruction.
///
/// Segments are produced once at planning time, persisted on the job, and
/// never reordered. The segment count equals the clip count for the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// 0-based, dense index
    pub index: u32,

    /// Verbatim subset of the normalized script spoken during this shot
    pub spoken_text: String,

    /// Instructions for the video model: camera framing, subject action,
    /// setting. Must not contain the spoken line (the spoken line is
    /// delivered separately to drive lip-sync).
    pub visual_prompt: String,
}

/// Check that the segments cover the normalized script exactly.
///
/// The concatenation of `spoken_text` over all segments must equal the
/// normalized script, allowing only whitespace differences.
pub fn segments_cover_script(segments: &[Segment], normalized_script: &str) -> bool {
    let spoken: String = segments
        .iter()
        .flat_map(|s| s.spoken_text.chars())
        .filter(|c| !c.is_whitespace())
        .collect();
    let script: String = normalized_script
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    spoken == script
}
