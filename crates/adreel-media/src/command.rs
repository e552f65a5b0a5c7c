//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
///
/// Inputs may be local paths or HTTPS URLs; ffmpeg reads remote inputs
/// directly so clips never touch the orchestrator host during assembly.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input references, in order (each becomes a -i argument)
    inputs: Vec<String>,
    /// Output file path
    output: PathBuf,
    /// Arguments placed before the inputs
    input_args: Vec<String>,
    /// Arguments placed after the inputs
    output_args: Vec<String>,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![input.into()],
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    /// Add another input (e.g. the replacement audio track).
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Add an argument placed before the inputs.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple arguments placed before the inputs.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument placed after the inputs.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple arguments placed after the inputs.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Allow the protocols the concat demuxer needs for HTTPS inputs.
    pub fn https_whitelist(self) -> Self {
        self.input_args(["-protocol_whitelist", "file,http,https,tcp,tls"])
    }

    /// Seek close to the end of the input (negative offset from EOF).
    pub fn seek_from_end(self, seconds: f64) -> Self {
        self.input_arg("-sseof").input_arg(format!("-{:.3}", seconds))
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        args.push("-y".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.clone());
        }

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }

    /// The output path this command writes.
    pub fn output_path(&self) -> &Path {
        &self.output
    }
}

/// Runner for FFmpeg commands with timeout and stderr capture.
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    ///
    /// On non-zero exit the captured stderr is carried in the error so the
    /// caller can surface the tool's own diagnostics.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().expect("stderr not captured");
        let stderr_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut captured = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    captured.push(line);
                }
            }
            captured
        });

        let status = self.wait_for_completion(&mut child).await?;
        let stderr_lines = stderr_handle.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr_lines.join("\n")),
                status.code(),
            ))
        }
    }

    /// Wait for the child process with optional timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        if let Some(timeout_secs) = self.timeout_secs {
            match tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                child.wait(),
            )
            .await
            {
                Ok(result) => Ok(result?),
                Err(_) => {
                    warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs);
                    let _ = child.kill().await;
                    Err(MediaError::Timeout(timeout_secs))
                }
            }
        } else {
            Ok(child.wait().await?)
        }
    }
}

/// Verify an output file exists and is non-empty.
pub(crate) async fn verify_output(path: &Path) -> MediaResult<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
    if meta.len() == 0 {
        return Err(MediaError::EmptyOutput(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_ordering() {
        let cmd = FfmpegCommand::new("input.mp4", "/tmp/out.mp4")
            .input_arg("-f")
            .input_arg("concat")
            .output_args(["-c", "copy"]);

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec!["-y", "-v", "error", "-f", "concat", "-i", "input.mp4", "-c", "copy", "/tmp/out.mp4"]
        );
    }

    #[test]
    fn test_multiple_inputs() {
        let cmd = FfmpegCommand::new("video.mp4", "/tmp/out.mp4").input("audio.mp3");
        let args = cmd.build_args();
        let i_positions: Vec<_> = args.iter().enumerate().filter(|(_, a)| *a == "-i").map(|(i, _)| i).collect();
        assert_eq!(i_positions.len(), 2);
        assert_eq!(args[i_positions[0] + 1], "video.mp4");
        assert_eq!(args[i_positions[1] + 1], "audio.mp3");
    }

    #[test]
    fn test_https_whitelist_goes_before_inputs() {
        let cmd = FfmpegCommand::new("manifest.txt", "/tmp/out.mp4").https_whitelist();
        let args = cmd.build_args();
        let whitelist_pos = args.iter().position(|a| a == "-protocol_whitelist").unwrap();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert!(whitelist_pos < input_pos);
    }
}
