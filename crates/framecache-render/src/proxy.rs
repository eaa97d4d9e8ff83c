//! Outbound proxy pool: rotates credentials and reports render outcomes back
//! to whichever proxy handled the request, when it exposes a status endpoint.

#[derive(Debug, Clone)]
pub struct ProxyInfo {
    pub url: String,
    pub country_code: String,
    pub status_report_url: Option<String>,
}

pub trait ProxyPool: Send + Sync {
    fn acquire(&self) -> impl std::future::Future<Output = Option<ProxyInfo>> + Send;

    fn report_status(
        &self,
        proxy: &ProxyInfo,
        succeeded: bool,
    ) -> impl std::future::Future<Output = ()> + Send;
}

impl<P: ProxyPool> ProxyPool for std::sync::Arc<P> {
    async fn acquire(&self) -> Option<ProxyInfo> {
        (**self).acquire().await
    }

    async fn report_status(&self, proxy: &ProxyInfo, succeeded: bool) {
        (**self).report_status(proxy, succeeded).await
    }
}

/// Round-robins over a statically configured list of proxy URLs. The
/// upstream behaviour additionally fetches a rotating list from a paid
/// proxy vendor's API on a timer; that vendor integration is a proprietary
/// external service this crate doesn't stand in for, so only the static
/// list is modelled here. Shared by the dispatcher and worker binaries,
/// both of which read the same `proxy_url`/`proxy_urls` config keys.
pub struct StaticProxyPool {
    urls: Vec<String>,
    next: std::sync::atomic::AtomicUsize,
}

impl StaticProxyPool {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls, next: std::sync::atomic::AtomicUsize::new(0) }
    }
}

impl ProxyPool for StaticProxyPool {
    async fn acquire(&self) -> Option<ProxyInfo> {
        if self.urls.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed) % self.urls.len();
        Some(ProxyInfo {
            url: self.urls[idx].clone(),
            country_code: "unknown".to_string(),
            status_report_url: None,
        })
    }

    async fn report_status(&self, _proxy: &ProxyInfo, _succeeded: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_pool_yields_none() {
        let pool = StaticProxyPool::new(vec![]);
        assert!(pool.acquire().await.is_none());
    }

    #[tokio::test]
    async fn pool_rotates_through_configured_urls() {
        let pool = StaticProxyPool::new(vec!["http://a".to_string(), "http://b".to_string()]);
        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_ne!(first.url, second.url);
    }
}
