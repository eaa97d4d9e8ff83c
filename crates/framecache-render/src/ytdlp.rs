//! Concrete fallback `MetadataStrategy`: shells out to `yt-dlp --dump-json`
//! and converts its format list into `PlaybackUrl`s. Runs after (or instead
//! of) a faster primary strategy; see the resolver module docs.

use serde::Deserialize;
use tokio::process::Command;

use framecache_models::VideoId;

use crate::resolver::{PlayabilityOutcome, PlaybackUrl};

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
    vcodec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    formats: Vec<YtDlpFormat>,
}

pub struct YtDlpStrategy;

impl crate::resolver::MetadataStrategy for YtDlpStrategy {
    async fn resolve(
        &self,
        video_id: &VideoId,
        proxy_url: Option<&str>,
        _is_livestream: bool,
    ) -> Result<PlayabilityOutcome, String> {
        which::which("yt-dlp").map_err(|_| "yt-dlp not found on PATH".to_string())?;

        let url = format!("https://www.youtube.com/watch?v={}", video_id.as_str());
        let mut cmd = Command::new("yt-dlp");
        cmd.args([
            "--dump-json",
            "--no-download",
            "--extractor-args",
            "youtube:skip=dash,hls,translated_subs;player_client=tv",
            &url,
        ]);
        if let Some(proxy_url) = proxy_url {
            cmd.args(["--proxy", proxy_url]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to spawn yt-dlp: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("yt-dlp exited with {}: {stderr}", output.status));
        }

        let info: YtDlpInfo =
            serde_json::from_slice(&output.stdout).map_err(|e| format!("failed to parse yt-dlp output: {e}"))?;

        let formats = info
            .formats
            .into_iter()
            .filter_map(|f| {
                let (url, height) = (f.url?, f.height?);
                Some(PlaybackUrl {
                    url,
                    width: f.width.unwrap_or(0),
                    height,
                    fps: f.fps.unwrap_or(30.0).round() as u32,
                    is_av1: f.vcodec.as_deref().is_some_and(|v| v.contains("av01")),
                })
            })
            .collect::<Vec<_>>();

        Ok(PlayabilityOutcome::Playable(formats))
    }
}
