//! FFmpeg-backed mux tool.

use async_trait::async_trait;

use adreel_media::{concat_clips, extract_last_frame, probe_duration, replace_audio_track, ScratchDir};

use crate::error::PipelineResult;
use crate::traits::MuxTool;

/// The production mux tool: every call runs ffmpeg/ffprobe in a fresh
/// scratch directory that is deleted on return.
#[derive(Debug, Clone, Default)]
pub struct FfmpegMux;

impl FfmpegMux {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MuxTool for FfmpegMux {
    async fn concat(&self, clip_urls: &[String]) -> PipelineResult<Vec<u8>> {
        let scratch = ScratchDir::new()?;
        let output = concat_clips(&scratch, clip_urls, "merged.mp4").await?;
        let bytes = tokio::fs::read(&output).await.map_err(adreel_media::MediaError::from)?;
        Ok(bytes)
    }

    async fn replace_audio(&self, video: &[u8], audio: &[u8]) -> PipelineResult<Vec<u8>> {
        let scratch = ScratchDir::new()?;
        let video_path = scratch.write("video.mp4", video).await?;
        let audio_path = scratch.write("voice.mp3", audio).await?;
        let output = replace_audio_track(&scratch, &video_path, &audio_path, "final.mp4").await?;
        let bytes = tokio::fs::read(&output).await.map_err(adreel_media::MediaError::from)?;
        Ok(bytes)
    }

    async fn extract_last_frame(&self, video: &[u8]) -> PipelineResult<Vec<u8>> {
        let scratch = ScratchDir::new()?;
        let video_path = scratch.write("clip.mp4", video).await?;
        Ok(extract_last_frame(&scratch, &video_path).await?)
    }

    async fn probe_duration(&self, video: &[u8]) -> PipelineResult<Option<f64>> {
        let scratch = ScratchDir::new()?;
        let video_path = scratch.write("clip.mp4", video).await?;
        Ok(probe_duration(&video_path).await.ok())
    }
}
