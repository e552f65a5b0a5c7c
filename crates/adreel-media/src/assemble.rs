//! Clip concatenation and audio-track replacement.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{verify_output, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::scratch::ScratchDir;

/// Timeout for assembly invocations. Concat over HTTPS streams the clips,
/// so the bound covers network transfer as well.
const ASSEMBLY_TIMEOUT_SECS: u64 = 600;

/// Concatenate clips into a single video.
///
/// `clip_urls` are presigned HTTPS URLs (or local paths in tests), in final
/// playback order. A concat-protocol manifest is written into `scratch` and
/// ffmpeg reads each clip directly over HTTPS; nothing is downloaded to the
/// host. Returns the local output path inside `scratch`.
pub async fn concat_clips(
    scratch: &ScratchDir,
    clip_urls: &[String],
    output_name: &str,
) -> MediaResult<PathBuf> {
    if clip_urls.is_empty() {
        return Err(MediaError::InvalidVideo("no clips to concatenate".to_string()));
    }

    let output = scratch.file(output_name);

    if clip_urls.len() == 1 {
        // Single-clip job: remux as-is, no concat demuxer involved.
        info!("Single clip, remuxing without concat");
        let cmd = FfmpegCommand::new(clip_urls[0].clone(), &output)
            .output_args(["-c", "copy", "-movflags", "+faststart"]);
        FfmpegRunner::new()
            .with_timeout(ASSEMBLY_TIMEOUT_SECS)
            .run(&cmd)
            .await?;
        verify_output(&output).await?;
        return Ok(output);
    }

    let manifest = build_concat_manifest(clip_urls);
    let manifest_path = scratch.write("concat.txt", manifest.as_bytes()).await?;

    info!("Concatenating {} clips", clip_urls.len());

    let cmd = FfmpegCommand::new(manifest_path.to_string_lossy(), &output)
        .https_whitelist()
        .input_args(["-f", "concat", "-safe", "0"])
        .output_args(["-c", "copy", "-movflags", "+faststart"]);

    FfmpegRunner::new()
        .with_timeout(ASSEMBLY_TIMEOUT_SECS)
        .run(&cmd)
        .await?;
    verify_output(&output).await?;
    Ok(output)
}

/// Replace the audio track of a video with a new one.
///
/// Video stream is copied untouched; the audio is re-encoded to AAC and the
/// output is trimmed to the shorter of the two inputs.
pub async fn replace_audio_track(
    scratch: &ScratchDir,
    video: &Path,
    audio: &Path,
    output_name: &str,
) -> MediaResult<PathBuf> {
    let output = scratch.file(output_name);

    info!("Replacing audio track of {}", video.display());

    let cmd = FfmpegCommand::new(video.to_string_lossy(), &output)
        .input(audio.to_string_lossy())
        .output_args([
            "-map", "0:v:0",
            "-map", "1:a:0",
            "-c:v", "copy",
            "-c:a", "aac",
            "-b:a", "192k",
            "-shortest",
            "-movflags", "+faststart",
        ]);

    FfmpegRunner::new()
        .with_timeout(ASSEMBLY_TIMEOUT_SECS)
        .run(&cmd)
        .await?;
    verify_output(&output).await?;
    Ok(output)
}

/// Build a concat-protocol manifest. Single quotes in references are escaped
/// per the concat demuxer's quoting rules.
fn build_concat_manifest(clip_urls: &[String]) -> String {
    let mut manifest = String::new();
    for url in clip_urls {
        let escaped = url.replace('\'', "'\\''");
        manifest.push_str(&format!("file '{}'\n", escaped));
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lists_clips_in_order() {
        let urls = vec![
            "https://r2.example/clips/clip_0.mp4?sig=a".to_string(),
            "https://r2.example/clips/clip_1.mp4?sig=b".to_string(),
        ];
        let manifest = build_concat_manifest(&urls);
        assert_eq!(
            manifest,
            "file 'https://r2.example/clips/clip_0.mp4?sig=a'\nfile 'https://r2.example/clips/clip_1.mp4?sig=b'\n"
        );
    }

    #[test]
    fn test_manifest_escapes_quotes() {
        let urls = vec!["/tmp/it's.mp4".to_string()];
        let manifest = build_concat_manifest(&urls);
        assert_eq!(manifest, "file '/tmp/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_concat_rejects_empty_input() {
        let scratch = ScratchDir::new().unwrap();
        let err = concat_clips(&scratch, &[], "merged.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }
}
