//! The work a worker executes for one job: resolve a playback URL, extract a
//! frame, commit it to storage, and publish completion status.

use std::path::PathBuf;

use tracing::{info, warn};

use framecache_eviction::EvictionEngine;
use framecache_kv::KvClient;
use framecache_models::{JobId, VideoId};
use framecache_storage::{ThumbnailStore, MIN_IMAGE_BYTES};

use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::extractor::{ExtractRequest, FrameExtractor};
use crate::frame_time::rounded_render_time;
use crate::proxy::ProxyPool;
use crate::resolver::{ChainResolver, MetadataStrategy, RenderResolveError};
use crate::semaphore::{admission_member, RenderAdmission};

pub struct RenderOutcome {
    pub rendered: bool,
}

pub struct RenderTask<Primary, Fallback, Extractor, Pool> {
    kv: KvClient,
    storage: ThumbnailStore,
    eviction: EvictionEngine,
    resolver: ChainResolver<Primary, Fallback>,
    extractor: Extractor,
    proxy_pool: Pool,
    http: reqwest::Client,
    config: RenderConfig,
}

impl<Primary, Fallback, Extractor, Pool> RenderTask<Primary, Fallback, Extractor, Pool>
where
    Primary: MetadataStrategy,
    Fallback: MetadataStrategy,
    Extractor: FrameExtractor,
    Pool: ProxyPool,
{
    pub fn new(
        kv: KvClient,
        storage: ThumbnailStore,
        eviction: EvictionEngine,
        resolver: ChainResolver<Primary, Fallback>,
        extractor: Extractor,
        proxy_pool: Pool,
        config: RenderConfig,
    ) -> Self {
        Self {
            kv,
            storage,
            eviction,
            resolver,
            extractor,
            proxy_pool,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Resolve, extract, commit, publish. See module docs for the full
    /// contract this implements.
    pub async fn generate(
        &self,
        video_id: VideoId,
        time: f64,
        title: Option<String>,
        is_livestream: bool,
        update_accounting: bool,
    ) -> RenderResult<RenderOutcome> {
        if !time.is_finite() || time < 0.0 {
            return Err(RenderError::InvalidTime(time));
        }

        let job_id = JobId::for_render(&video_id, time);

        if update_accounting {
            self.storage.touch_last_used(&video_id).await;
        }

        let member = admission_member(video_id.as_str(), time, is_livestream);
        let admission = RenderAdmission::acquire(&self.kv, member, self.config.max_concurrent_renders).await?;

        let result = self
            .generate_admitted(&video_id, time, title, is_livestream, update_accounting, &job_id)
            .await;

        admission.release(&self.kv).await?;

        match &result {
            Ok(_) => {
                let _ = self.kv.publish(job_id.as_str(), "true").await;
                if let Err(e) = self.eviction.check_if_cleanup_needed().await {
                    warn!(error = %e, "cleanup trigger failed");
                }
            }
            Err(_) => {
                let _ = self.kv.publish(job_id.as_str(), "false").await;
            }
        }

        result
    }

    async fn generate_admitted(
        &self,
        video_id: &VideoId,
        time: f64,
        title: Option<String>,
        is_livestream: bool,
        update_accounting: bool,
        job_id: &JobId,
    ) -> RenderResult<RenderOutcome> {
        let proxy = self.proxy_pool.acquire().await;
        let proxy_url = proxy.as_ref().map(|p| p.url.as_str());

        let formats = match self
            .resolver
            .resolve_formats(video_id, proxy_url, is_livestream)
            .await
        {
            Ok(formats) => formats,
            Err(RenderResolveError::LoginRequired) => {
                return Err(RenderError::LoginRequired(video_id.as_str().to_string()));
            }
            Err(RenderResolveError::Failed(reason)) => {
                return Err(RenderError::Resolver(reason));
            }
        };

        let Some(playback) = formats
            .into_iter()
            .find(|f| f.height <= self.config.default_max_height)
        else {
            return Err(RenderError::NoSuitableFormat(self.config.default_max_height));
        };

        let rounded_time = rounded_render_time(time, playback.fps);

        self.storage.ensure_video_dir(video_id).await?;
        let output_path = self.storage.image_path(video_id, rounded_time, is_livestream);

        let source_url = if is_livestream {
            let download_path = self.storage.live_download_path(video_id, rounded_time);
            self.download_live_stream(&playback.url, &download_path, proxy_url)
                .await?;
            download_path.to_string_lossy().into_owned()
        } else {
            playback.url.clone()
        };

        let extract_result = self
            .extract_with_retry(&source_url, rounded_time, &output_path, proxy_url)
            .await;

        if is_livestream {
            let _ = tokio::fs::remove_file(self.storage.live_download_path(video_id, rounded_time)).await;
        }

        if let Err(reason) = extract_result {
            let _ = tokio::fs::remove_file(&output_path).await;
            if let Some(proxy) = &proxy {
                self.proxy_pool.report_status(proxy, false).await;
            }
            return Err(RenderError::GenerationFailed {
                video_id: video_id.as_str().to_string(),
                time,
                reason,
            });
        }

        let image_size = tokio::fs::metadata(&output_path).await.map(|m| m.len()).unwrap_or(0);
        if image_size <= MIN_IMAGE_BYTES {
            let _ = tokio::fs::remove_file(&output_path).await;
            if let Some(proxy) = &proxy {
                self.proxy_pool.report_status(proxy, false).await;
            }
            return Err(RenderError::GenerationFailed {
                video_id: video_id.as_str().to_string(),
                time,
                reason: format!("image file is only {image_size} bytes, probably a premiere"),
            });
        }

        let mut title_bytes = 0u64;
        if let Some(title) = &title {
            self.storage.write_title(video_id, rounded_time, title).await?;
            title_bytes = title.len() as u64;
        }

        if update_accounting {
            let added = title_bytes + image_size;
            if let Err(e) = self.kv.incr_by(framecache_eviction::STORAGE_USED_KEY, added as i64).await {
                warn!(error = %e, "failed to update storage-used accounting");
            }
        }

        if let Some(proxy) = &proxy {
            self.proxy_pool.report_status(proxy, true).await;
        }

        info!(job_id = %job_id, "rendered thumbnail");
        Ok(RenderOutcome { rendered: true })
    }

    async fn download_live_stream(
        &self,
        url: &str,
        destination: &PathBuf,
        proxy_url: Option<&str>,
    ) -> RenderResult<()> {
        let client = match proxy_url.and_then(|p| reqwest::Proxy::all(p).ok()) {
            Some(proxy) => reqwest::Client::builder()
                .proxy(proxy)
                .build()
                .unwrap_or_else(|_| self.http.clone()),
            None => self.http.clone(),
        };

        let result: RenderResult<()> = async {
            let response = client.get(url).timeout(self.config.live_download_timeout).send().await?;
            let bytes = response.bytes().await?;
            tokio::fs::write(destination, &bytes).await?;
            Ok(())
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(destination).await;
        }
        result
    }

    /// One attempt direct (or through the proxy when `skip_local_ffmpeg` is
    /// set and a proxy is available), then one retry through the proxy if
    /// the first attempt wasn't already routed through it.
    async fn extract_with_retry(
        &self,
        source_url: &str,
        seek_seconds: f64,
        output_path: &std::path::Path,
        proxy_url: Option<&str>,
    ) -> Result<(), String> {
        let first_proxy = if self.config.skip_local_ffmpeg { proxy_url } else { None };

        let first = self
            .extractor
            .extract_frame(ExtractRequest {
                source_url,
                seek_seconds,
                output_path,
                proxy_url: first_proxy,
                timeout: self.config.extractor_timeout,
            })
            .await;

        if first.is_ok() {
            return Ok(());
        }

        if first_proxy.is_none() {
            if let Some(proxy_url) = proxy_url {
                return self
                    .extractor
                    .extract_frame(ExtractRequest {
                        source_url,
                        seek_seconds,
                        output_path,
                        proxy_url: Some(proxy_url),
                        timeout: self.config.extractor_timeout,
                    })
                    .await;
            }
        }

        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_member_includes_all_three_coordinates() {
        let member = admission_member("jNQXAC9IVRw", 12.5, false);
        assert_eq!(member, "jNQXAC9IVRw 12.5 false");
    }
}
