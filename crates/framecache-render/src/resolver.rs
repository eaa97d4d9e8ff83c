//! External video-metadata resolution. Modelled as a two-strategy chain: a
//! fast primary metadata fetch with a cheap hard-geoblock signal, falling
//! back to a slower generic extractor when the primary strategy is disabled
//! or errors (not when it geoblocks, which is terminal).

use framecache_models::VideoId;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUrl {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub is_av1: bool,
}

/// Tagged outcome so callers can distinguish a hard geoblock (give up, no
/// retry) from a transient error (retry once through a proxy).
#[derive(Debug, Clone, PartialEq)]
pub enum PlayabilityOutcome {
    Playable(Vec<PlaybackUrl>),
    Unplayable,
    LoginRequired,
}

/// One metadata-fetch strategy. `resolve` returns the raw format list for a
/// video; the chain filters/sorts/picks afterward.
pub trait MetadataStrategy: Send + Sync {
    fn resolve(
        &self,
        video_id: &VideoId,
        proxy_url: Option<&str>,
        is_livestream: bool,
    ) -> impl std::future::Future<Output = Result<PlayabilityOutcome, String>> + Send;
}

/// The resolver consumed by the render task: two strategies, AV1
/// preference, and height-descending pick of the first entry `<= max_height`.
pub struct ChainResolver<P, F> {
    primary: Option<P>,
    fallback: F,
}

impl<P, F> ChainResolver<P, F>
where
    P: MetadataStrategy,
    F: MetadataStrategy,
{
    pub fn new(primary: Option<P>, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// Resolve playback formats for `video_id`, applying the AV1 filter and
    /// height-descending sort described at the module level.
    pub async fn resolve_formats(
        &self,
        video_id: &VideoId,
        proxy_url: Option<&str>,
        is_livestream: bool,
    ) -> Result<Vec<PlaybackUrl>, RenderResolveError> {
        let outcome = if let Some(primary) = &self.primary {
            match primary.resolve(video_id, proxy_url, is_livestream).await {
                Ok(PlayabilityOutcome::Unplayable) => return Ok(Vec::new()),
                Ok(PlayabilityOutcome::LoginRequired) => return Err(RenderResolveError::LoginRequired),
                Ok(outcome @ PlayabilityOutcome::Playable(_)) => outcome,
                Err(_) => self
                    .fallback
                    .resolve(video_id, proxy_url, is_livestream)
                    .await
                    .map_err(RenderResolveError::Failed)?,
            }
        } else {
            self.fallback
                .resolve(video_id, proxy_url, is_livestream)
                .await
                .map_err(RenderResolveError::Failed)?
        };

        let formats = match outcome {
            PlayabilityOutcome::Playable(formats) => formats,
            PlayabilityOutcome::Unplayable => return Ok(Vec::new()),
            PlayabilityOutcome::LoginRequired => return Err(RenderResolveError::LoginRequired),
        };

        Ok(rank_formats(formats))
    }

    /// Pick the first ranked format whose height is `<= max_height`.
    pub async fn resolve(
        &self,
        video_id: &VideoId,
        proxy_url: Option<&str>,
        is_livestream: bool,
        max_height: u32,
    ) -> Result<Option<PlaybackUrl>, RenderResolveError> {
        let formats = self.resolve_formats(video_id, proxy_url, is_livestream).await?;
        Ok(formats.into_iter().find(|f| f.height <= max_height))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderResolveError {
    #[error("login required")]
    LoginRequired,
    #[error("resolver failed: {0}")]
    Failed(String),
}

/// Filter to AV1 variants when any are present (decodes faster per pixel),
/// then sort by descending height.
fn rank_formats(formats: Vec<PlaybackUrl>) -> Vec<PlaybackUrl> {
    let has_av1 = formats.iter().any(|f| f.is_av1);
    let mut formats: Vec<PlaybackUrl> = if has_av1 {
        formats.into_iter().filter(|f| f.is_av1).collect()
    } else {
        formats
    };
    formats.sort_by(|a, b| b.height.cmp(&a.height));
    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_formats_sorts_by_descending_height() {
        let formats = vec![
            PlaybackUrl { url: "a".into(), width: 640, height: 360, fps: 30, is_av1: false },
            PlaybackUrl { url: "b".into(), width: 1280, height: 720, fps: 30, is_av1: false },
        ];
        let ranked = rank_formats(formats);
        assert_eq!(ranked[0].height, 720);
        assert_eq!(ranked[1].height, 360);
    }

    #[test]
    fn rank_formats_filters_to_av1_when_present() {
        let formats = vec![
            PlaybackUrl { url: "a".into(), width: 1280, height: 720, fps: 30, is_av1: false },
            PlaybackUrl { url: "b".into(), width: 640, height: 360, fps: 30, is_av1: true },
        ];
        let ranked = rank_formats(formats);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].is_av1);
    }
}
