use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "TWEETERS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub page: PageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind to the IPv4 address of this interface (e.g. "wlan0") when present
    #[serde(default)]
    pub bind_interface: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Gcs,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Bucket holding the CSV snapshots and images
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Local mirror used by the directory backend
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Prefix prepended to image names to build browser-facing URLs
    #[serde(default = "default_asset_url_prefix")]
    pub asset_url_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound on one refresh cycle
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Re-list the store on every tick so a new day's files are picked up
    #[serde(default = "default_relist_each_tick")]
    pub relist_each_tick: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_backend() -> StorageBackend {
    StorageBackend::Gcs
}

fn default_bucket() -> String {
    "tweeterssp-web-site-contents".to_string()
}

fn default_directory() -> String {
    "data".to_string()
}

fn default_asset_url_prefix() -> String {
    "//storage.googleapis.com/tweeterssp-web-site-contents/".to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_relist_each_tick() -> bool {
    true
}

fn default_title() -> String {
    "Tweeters - Sun Prairie, WI USA".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bind_interface: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: default_bucket(),
            directory: default_directory(),
            asset_url_prefix: default_asset_url_prefix(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            relist_each_tick: default_relist_each_tick(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            refresh: RefreshConfig::default(),
            page: PageConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: DashboardConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    /// Resolve the config path from the environment and load it.
    ///
    /// A missing file is not an error: the dashboard runs on defaults.
    /// Returns the config and whether a file was actually read.
    pub fn load() -> anyhow::Result<(Self, bool)> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if !Path::new(&path).exists() {
            return Ok((Self::default(), false));
        }
        Ok((Self::from_file(&path)?, true))
    }
}
