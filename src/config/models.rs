use crate::humanize::ByteSize;
use crate::manifest::{AspectRatio, ClipSeconds, MediaKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub staging: StagingConfig,
}

/// Deployment environment; staging endpoints only run in development
///
/// Defaults to production so an unconfigured deployment keeps them closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

/// Filesystem layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory served as the site root; generated artifacts land below it
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "default_image_manifest")]
    pub image_manifest: PathBuf,
    #[serde(default = "default_video_manifest")]
    pub video_manifest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            public_dir: default_public_dir(),
            image_manifest: default_image_manifest(),
            video_manifest: default_video_manifest(),
        }
    }
}

impl PathsConfig {
    pub fn manifest_for(&self, kind: MediaKind) -> &PathBuf {
        match kind {
            MediaKind::Image => &self.image_manifest,
            MediaKind::Video => &self.video_manifest,
        }
    }
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_image_manifest() -> PathBuf {
    PathBuf::from("data/image-manifest.json")
}

fn default_video_manifest() -> PathBuf {
    PathBuf::from("data/video-manifest.json")
}

/// Generative-media API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Per-request timeout; image generation regularly takes 30s+
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: ByteSize,
    #[serde(default = "default_download_retries")]
    pub download_retries: u32,
    /// API key (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_download_bytes: default_max_download_bytes(),
            download_retries: default_download_retries(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_download_bytes() -> ByteSize {
    ByteSize(200 * 1024 * 1024) // 200 MB
}

fn default_download_retries() -> u32 {
    3
}

/// Image generation defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_model")]
    pub model: String,
    /// Output directory relative to `paths.public_dir`
    #[serde(default = "default_image_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_image_count")]
    pub default_count: u32,
    #[serde(default = "default_aspect")]
    pub default_aspect: AspectRatio,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            output_dir: default_image_output_dir(),
            default_count: default_image_count(),
            default_aspect: default_aspect(),
        }
    }
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_image_output_dir() -> String {
    "generated/images".to_string()
}

fn default_image_count() -> u32 {
    3
}

fn default_aspect() -> AspectRatio {
    AspectRatio::Landscape
}

/// Video generation defaults and poll policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_model")]
    pub model: String,
    #[serde(default = "default_video_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_video_count")]
    pub default_count: u32,
    #[serde(default = "default_aspect")]
    pub default_aspect: AspectRatio,
    #[serde(default = "default_duration")]
    pub default_duration: ClipSeconds,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            model: default_video_model(),
            output_dir: default_video_output_dir(),
            default_count: default_video_count(),
            default_aspect: default_aspect(),
            default_duration: default_duration(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

impl VideoConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn default_video_model() -> String {
    "veo-3.1-generate-preview".to_string()
}

fn default_video_output_dir() -> String {
    "generated/videos".to_string()
}

fn default_video_count() -> u32 {
    2
}

fn default_duration() -> ClipSeconds {
    ClipSeconds::LONGEST
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_poll_timeout_secs() -> u64 {
    300 // 5 minutes
}

/// Generation settings of one media kind, viewed uniformly
#[derive(Debug, Clone)]
pub struct KindSettings<'a> {
    pub kind: MediaKind,
    pub model: &'a str,
    pub output_dir: &'a str,
    pub default_count: u32,
    pub default_aspect: AspectRatio,
    pub default_duration: Option<ClipSeconds>,
}

impl Config {
    pub fn kind_settings(&self, kind: MediaKind) -> KindSettings<'_> {
        match kind {
            MediaKind::Image => KindSettings {
                kind,
                model: &self.image.model,
                output_dir: &self.image.output_dir,
                default_count: self.image.default_count,
                default_aspect: self.image.default_aspect,
                default_duration: None,
            },
            MediaKind::Video => KindSettings {
                kind,
                model: &self.video.model,
                output_dir: &self.video.output_dir,
                default_count: self.video.default_count,
                default_aspect: self.video.default_aspect,
                default_duration: Some(self.video.default_duration),
            },
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Staging server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    /// Page each slot is displayed on, used for cross-page slot navigation
    #[serde(default)]
    pub slot_pages: BTreeMap<String, String>,
    #[serde(default = "default_stash_ttl_secs")]
    pub stash_ttl_secs: u64,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
            slot_pages: BTreeMap::new(),
            stash_ttl_secs: default_stash_ttl_secs(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4400))
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}

fn default_stash_ttl_secs() -> u64 {
    10
}
