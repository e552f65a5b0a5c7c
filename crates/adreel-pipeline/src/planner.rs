//! Script planning step.
//!
//! Turns the normalized script into ordered segments via the text planner
//! and enforces the coverage invariant: the concatenation of spoken lines
//! must reproduce the normalized script (whitespace-insensitive). One
//! corrective re-prompt is allowed; a second violation fails the job.

use tracing::warn;

use adreel_engine::PlannedShot;
use adreel_models::{segments_cover_script, Segment};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

/// Plan the script into segments.
pub async fn plan_segments(
    ctx: &PipelineContext,
    normalized_script: &str,
    character_name: &str,
) -> PipelineResult<Vec<Segment>> {
    let shots = ctx
        .planner
        .plan(
            normalized_script,
            character_name,
            ctx.config.target_seconds_per_clip,
            None,
        )
        .await?;

    let segments = to_segments(shots);
    if segments_cover_script(&segments, normalized_script) {
        return Ok(segments);
    }

    warn!("Planner output does not cover the script, re-prompting once");

    let correction = "Your previous answer did not reproduce the script exactly. \
                      The concatenated spoken_text values must equal the script verbatim, \
                      in order, with no sentence added, dropped or reworded.";
    let shots = ctx
        .planner
        .plan(
            normalized_script,
            character_name,
            ctx.config.target_seconds_per_clip,
            Some(correction),
        )
        .await?;

    let segments = to_segments(shots);
    if segments_cover_script(&segments, normalized_script) {
        return Ok(segments);
    }

    Err(PipelineError::planning(
        "planner output does not cover the script after corrective retry",
    ))
}

fn to_segments(shots: Vec<PlannedShot>) -> Vec<Segment> {
    shots
        .into_iter()
        .enumerate()
        .map(|(index, shot)| Segment {
            index: index as u32,
            spoken_text: shot.spoken_text,
            visual_prompt: shot.visual_prompt,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_segments_assigns_dense_indices() {
        let shots = vec![
            PlannedShot {
                spoken_text: "A.".into(),
                visual_prompt: "wide".into(),
            },
            PlannedShot {
                spoken_text: "B.".into(),
                visual_prompt: "close".into(),
            },
        ];
        let segments = to_segments(shots);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[1].index, 1);
    }
}
