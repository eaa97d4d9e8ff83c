//! Render task configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub default_max_height: u32,
    pub max_concurrent_renders: i64,
    pub skip_local_ffmpeg: bool,
    pub extractor_timeout: Duration,
    pub live_download_timeout: Duration,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_max_height: 480,
            max_concurrent_renders: 4,
            skip_local_ffmpeg: false,
            extractor_timeout: Duration::from_secs(20),
            live_download_timeout: Duration::from_secs(5),
        }
    }
}
