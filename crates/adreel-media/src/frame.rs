//! Continuity-frame extraction.

use std::path::Path;

use tracing::debug;

use crate::command::{verify_output, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::scratch::ScratchDir;

const EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Extract the last frame of a clip as a PNG.
///
/// The frame conditions the next clip's generation so the character and
/// scene persist across the cut. Seeks a fraction of a second before EOF
/// and keeps the final decoded frame.
pub async fn extract_last_frame(scratch: &ScratchDir, video: &Path) -> MediaResult<Vec<u8>> {
    let output = scratch.file("last_frame.png");

    debug!("Extracting last frame of {}", video.display());

    let cmd = FfmpegCommand::new(video.to_string_lossy(), &output)
        .seek_from_end(0.25)
        .output_args(["-update", "1", "-frames:v", "1"]);

    FfmpegRunner::new()
        .with_timeout(EXTRACT_TIMEOUT_SECS)
        .run(&cmd)
        .await?;
    verify_output(&output).await?;

    scratch.read("last_frame.png").await
}
