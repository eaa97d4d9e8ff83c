//! External frame extraction: seek into a playback URL (or local file) and
//! emit a single frame to `output_path`.

use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExtractRequest<'a> {
    pub source_url: &'a str,
    pub seek_seconds: f64,
    pub output_path: &'a Path,
    pub proxy_url: Option<&'a str>,
    pub timeout: Duration,
}

pub trait FrameExtractor: Send + Sync {
    fn extract_frame(
        &self,
        request: ExtractRequest<'_>,
    ) -> impl std::future::Future<Output = Result<(), String>> + Send;
}
