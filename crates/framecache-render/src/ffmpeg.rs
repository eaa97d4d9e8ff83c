//! Concrete `FrameExtractor`: shells out to `ffmpeg` to seek and decode a
//! single frame. Builder shape follows the same input/output-args split as
//! a conventional FFmpeg command wrapper.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::extractor::{ExtractRequest, FrameExtractor};

#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: String,
    output: PathBuf,
    seek_seconds: f64,
    proxy_url: Option<String>,
}

impl FfmpegCommand {
    fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        if let Some(proxy) = &self.proxy_url {
            args.push("-http_proxy".to_string());
            args.push(proxy.clone());
        }
        args.push("-ss".to_string());
        args.push(self.seek_seconds.to_string());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args.push("-vframes".to_string());
        args.push("1".to_string());
        args.push("-lossless".to_string());
        args.push("0".to_string());
        args.push("-pix_fmt".to_string());
        args.push("bgra".to_string());
        args.push("-timelimit".to_string());
        args.push("20".to_string());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Extracts one frame per invocation via a child `ffmpeg` process.
pub struct FfmpegExtractor;

impl FrameExtractor for FfmpegExtractor {
    async fn extract_frame(&self, request: ExtractRequest<'_>) -> Result<(), String> {
        which::which("ffmpeg").map_err(|_| "ffmpeg not found on PATH".to_string())?;

        let cmd = FfmpegCommand {
            input: request.source_url.to_string(),
            output: request.output_path.to_path_buf(),
            seek_seconds: request.seek_seconds,
            proxy_url: request.proxy_url.map(str::to_string),
        };
        let args = cmd.build_args();
        debug!("running ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn ffmpeg: {e}"))?;

        let status = tokio::time::timeout(request.timeout, child.wait())
            .await
            .map_err(|_| {
                let _ = child.start_kill();
                "ffmpeg timed out".to_string()
            })?
            .map_err(|e| format!("ffmpeg wait failed: {e}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("ffmpeg exited with status {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn build_args_includes_seek_and_single_frame() {
        let cmd = FfmpegCommand {
            input: "https://example.com/video".to_string(),
            output: PathBuf::from("/tmp/out.webp"),
            seek_seconds: 12.5,
            proxy_url: None,
        };
        let args = cmd.build_args();
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"12.5".to_string()));
        assert!(args.contains(&"-vframes".to_string()));
    }

    #[test]
    fn build_args_adds_http_proxy_when_set() {
        let cmd = FfmpegCommand {
            input: "https://example.com/video".to_string(),
            output: Path::new("/tmp/out.webp").to_path_buf(),
            seek_seconds: 0.0,
            proxy_url: Some("http://proxy:8080".to_string()),
        };
        let args = cmd.build_args();
        assert!(args.contains(&"-http_proxy".to_string()));
    }
}
