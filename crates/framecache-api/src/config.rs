//! Layered application configuration: a base YAML file plus `FRAMECACHE_`-prefixed
//! environment overrides, matching the schema in the external-interfaces contract.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub worker_health_check_port: u16,
    #[serde(default)]
    pub reload: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailStorageConfig {
    pub path: String,
    pub max_size: u64,
    pub cleanup_multiplier: f64,
    pub redis_offset_allowed: i64,
    pub max_before_async_generation: i64,
    pub max_queue_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtAuthConfig {
    pub visitor_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub thumbnail_storage: ThumbnailStorageConfig,
    pub redis: RedisConfig,
    pub default_max_height: u32,
    pub status_auth_password: String,
    pub front_auth: String,
    pub floatie_auth: String,
    #[serde(default)]
    pub yt_auth: YtAuthConfig,
    #[serde(default)]
    pub try_floatie: bool,
    #[serde(default)]
    pub try_floatie_for_live: bool,
    #[serde(default = "default_true")]
    pub try_ytdlp: bool,
    #[serde(default)]
    pub skip_local_ffmpeg: bool,
    pub proxy_url: Option<String>,
    pub proxy_urls: Option<Vec<String>>,
    pub proxy_token: Option<String>,
    pub max_concurrent_renders: i64,
    pub max_concurrent_ytdlp: i64,
    #[serde(default)]
    pub debug: bool,
}

impl Default for YtAuthConfig {
    fn default() -> Self {
        Self { visitor_data: None }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Layer a base YAML file (path from `FRAMECACHE_CONFIG`, defaulting to
    /// `config.yaml`) with `FRAMECACHE_`-prefixed environment overrides.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("FRAMECACHE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FRAMECACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
