//! On-disk layout: `<root>/<videoID>/<time>[-live].webp` for images,
//! `<root>/<videoID>/<time>.txt` for titles. Every successful read touches
//! the `last-used` index so the eviction engine can pick victims in
//! ascending-score order.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use tokio::fs;
use tracing::warn;

use framecache_kv::KvClient;
use framecache_models::{format_time, VideoId};

use crate::error::StorageResult;

pub const IMAGE_EXT: &str = "webp";
pub const META_EXT: &str = "txt";

/// Files at or below this size are assumed corrupt (e.g. a premiere
/// placeholder) and deleted on discovery.
pub const MIN_IMAGE_BYTES: u64 = 200;

pub const LAST_USED_KEY: &str = "last-used";

/// A thumbnail read from disk, with its optional title.
#[derive(Debug, Clone)]
pub struct ThumbnailRead {
    pub bytes: Vec<u8>,
    pub title: Option<String>,
    /// The frame-aligned timestamp the bytes were found under, so a caller
    /// that didn't know the exact time up front (e.g. `latestThumbnail`)
    /// can still report `X-Timestamp`.
    pub time: f64,
}

#[derive(Clone)]
pub struct ThumbnailStore {
    root: PathBuf,
    kv: KvClient,
}

impl ThumbnailStore {
    pub fn new(root: impl Into<PathBuf>, kv: KvClient) -> Self {
        Self {
            root: root.into(),
            kv,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_dir(&self, video_id: &VideoId) -> PathBuf {
        self.root.join(video_id.as_str())
    }

    pub fn image_path(&self, video_id: &VideoId, time: f64, is_livestream: bool) -> PathBuf {
        let suffix = if is_livestream { "-live" } else { "" };
        self.video_dir(video_id)
            .join(format!("{}{}.{}", format_time(time), suffix, IMAGE_EXT))
    }

    pub fn meta_path(&self, video_id: &VideoId, time: f64) -> PathBuf {
        self.video_dir(video_id)
            .join(format!("{}.{}", format_time(time), META_EXT))
    }

    /// Transient MP4 path used while downloading a live-stream's playback URL.
    pub fn live_download_path(&self, video_id: &VideoId, time: f64) -> PathBuf {
        self.video_dir(video_id)
            .join(format!("{}.mp4", format_time(time)))
    }

    pub async fn ensure_video_dir(&self, video_id: &VideoId) -> StorageResult<()> {
        fs::create_dir_all(self.video_dir(video_id)).await?;
        Ok(())
    }

    /// Write the extractor's output. On failure the partial file is removed.
    pub async fn write_image(&self, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(err) = fs::write(path, bytes).await {
            let _ = fs::remove_file(path).await;
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn write_title(&self, video_id: &VideoId, time: f64, title: &str) -> StorageResult<()> {
        fs::write(self.meta_path(video_id, time), title.as_bytes()).await?;
        Ok(())
    }

    async fn read_title(&self, video_id: &VideoId, time: f64) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.meta_path(video_id, time)).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the cached image; `None` signals a miss (absent or zero bytes).
    pub async fn read_image(
        &self,
        video_id: &VideoId,
        time: f64,
        is_livestream: bool,
    ) -> StorageResult<Option<ThumbnailRead>> {
        let image_path = self.image_path(video_id, time, is_livestream);
        let bytes = match fs::read(&image_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        let title = self.read_title(video_id, time).await?;
        self.touch_last_used(video_id).await;
        Ok(Some(ThumbnailRead { bytes, title, time }))
    }

    /// Touch the last-used index with the current time for `video_id`.
    /// Non-fatal: a failure here is logged, not propagated.
    pub async fn touch_last_used(&self, video_id: &VideoId) {
        let now = Utc::now().timestamp() as f64;
        if let Err(err) = self.kv.zadd(LAST_USED_KEY, video_id.as_str(), now).await {
            warn!(video_id = %video_id, error = %err, "failed to touch last-used index");
        }
    }

    async fn dir_entries_by_mtime_desc(&self, video_id: &VideoId) -> StorageResult<Vec<PathBuf>> {
        let dir = self.video_dir(video_id);
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files: Vec<(PathBuf, SystemTime)> = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                let modified = metadata
                    .modified()
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                files.push((entry.path(), modified));
            }
        }
        files.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(files.into_iter().map(|(path, _)| path).collect())
    }

    /// The video's most recent thumbnail. `best-<videoID>` wins if set and
    /// the implied file exists; otherwise prefer the latest `.txt`'s image,
    /// then the latest image file.
    pub async fn latest_thumbnail(
        &self,
        video_id: &VideoId,
        is_livestream: bool,
    ) -> StorageResult<Option<ThumbnailRead>> {
        let best_key = format!("best-{video_id}");
        if let Ok(Some(time_str)) = self.kv.get(&best_key).await {
            if let Ok(time) = time_str.parse::<f64>() {
                if let Some(read) = self.read_image(video_id, time, is_livestream).await? {
                    return Ok(Some(read));
                }
            }
        }

        let files = self.dir_entries_by_mtime_desc(video_id).await?;

        for path in &files {
            if path.extension().and_then(|e| e.to_str()) == Some(META_EXT) {
                if let Some(time) = stem_time(path) {
                    if let Some(read) = self.read_image(video_id, time, is_livestream).await? {
                        return Ok(Some(read));
                    }
                }
            }
        }

        for path in &files {
            if path.extension().and_then(|e| e.to_str()) == Some(IMAGE_EXT) {
                let bytes = fs::read(path).await?;
                if bytes.is_empty() {
                    continue;
                }
                let time = stem_time(path).unwrap_or(0.0);
                let title = if stem_time(path).is_some() {
                    self.read_title(video_id, time).await?
                } else {
                    None
                };
                self.touch_last_used(video_id).await;
                return Ok(Some(ThumbnailRead { bytes, title, time }));
            }
        }

        Ok(None)
    }

    /// Scan for an image whose stem starts with `floor(time*1000)/1000`, to
    /// interoperate with callers that compute `time` at lower precision than
    /// what was stored.
    pub async fn locate_by_truncated_prefix(
        &self,
        video_id: &VideoId,
        time: f64,
    ) -> StorageResult<Option<f64>> {
        let truncated = (time * 1000.0).floor() / 1000.0;
        let prefix = format_time(truncated);
        let dir = self.video_dir(video_id);
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let bare_stem = stem.trim_end_matches("-live");
                if bare_stem.starts_with(&prefix) {
                    if let Ok(found) = bare_stem.parse::<f64>() {
                        return Ok(Some(found));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Parse the time component out of a `<time>.ext` or `<time>-live.ext` stem.
fn stem_time(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    stem.trim_end_matches("-live").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_time_strips_live_suffix() {
        assert_eq!(stem_time(Path::new("/x/17.0-live.webp")), Some(17.0));
        assert_eq!(stem_time(Path::new("/x/17.0.webp")), Some(17.0));
    }

    #[test]
    fn stem_time_rejects_non_numeric_stem() {
        assert_eq!(stem_time(Path::new("/x/best.webp")), None);
    }
}
