//! Worker configuration: the subset of the shared config file this process
//! needs (rendering, storage, and the health-check port), layered the same
//! way the dispatcher's `AppConfig` is.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub worker_health_check_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailStorageConfig {
    pub path: String,
    pub max_size: u64,
    pub cleanup_multiplier: f64,
    pub redis_offset_allowed: i64,
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
pub struct WorkerConfig {
    pub server: ServerConfig,
    pub thumbnail_storage: ThumbnailStorageConfig,
    pub redis: RedisConfig,
    pub default_max_height: u32,
    #[serde(default)]
    pub skip_local_ffmpeg: bool,
    pub proxy_url: Option<String>,
    pub proxy_urls: Option<Vec<String>>,
    pub max_concurrent_renders: i64,
    #[serde(default)]
    pub debug: bool,
}

fn default_config_path() -> String {
    std::env::var("FRAMECACHE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string())
}

impl WorkerConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = default_config_path();

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
