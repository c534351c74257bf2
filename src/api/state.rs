use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::generator::{GeminiBackend, GenerationError, MediaBackend, VariantGenerator};
use crate::manifest::{ManifestStore, MediaKind};
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub images: Arc<ManifestStore>,
    pub videos: Arc<ManifestStore>,
    pub image_generator: Option<Arc<VariantGenerator>>,
    pub video_generator: Option<Arc<VariantGenerator>>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// State without generation; the generate endpoint answers 503
    pub fn new(config: Config, images: ManifestStore, videos: ManifestStore) -> Self {
        Self {
            config: Arc::new(config),
            images: Arc::new(images),
            videos: Arc::new(videos),
            image_generator: None,
            video_generator: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// File-backed stores, plus generation when an API key is configured
    pub fn from_config(config: Config) -> Result<Self, GenerationError> {
        let images = ManifestStore::open_file(MediaKind::Image, &config.paths.image_manifest);
        let videos = ManifestStore::open_file(MediaKind::Video, &config.paths.video_manifest);

        let backend = match GeminiBackend::new(&config.api) {
            Ok(backend) => Some(backend),
            Err(GenerationError::MissingCredential) => {
                warn!("No API key configured, generate endpoint disabled");
                None
            }
            Err(e) => return Err(e),
        };

        let state = Self::new(config, images, videos);
        Ok(match backend {
            Some(backend) => {
                info!("Generation enabled");
                state.with_backend(Arc::new(backend))
            }
            None => state,
        })
    }

    /// Attach generators for both kinds sharing `backend`
    pub fn with_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        let build = |kind, store: &Arc<ManifestStore>| {
            Arc::new(
                VariantGenerator::new(&self.config, kind, backend.clone(), store.clone())
                    .with_metrics(self.metrics.clone()),
            )
        };
        let image_generator = build(MediaKind::Image, &self.images);
        let video_generator = build(MediaKind::Video, &self.videos);

        self.image_generator = Some(image_generator);
        self.video_generator = Some(video_generator);
        self
    }

    /// Replace the generators, e.g. with ones using a custom sleeper
    pub fn with_generators(mut self, image: VariantGenerator, video: VariantGenerator) -> Self {
        self.image_generator = Some(Arc::new(image.with_metrics(self.metrics.clone())));
        self.video_generator = Some(Arc::new(video.with_metrics(self.metrics.clone())));
        self
    }

    pub fn store(&self, kind: MediaKind) -> &Arc<ManifestStore> {
        match kind {
            MediaKind::Image => &self.images,
            MediaKind::Video => &self.videos,
        }
    }

    pub fn generator(&self, kind: MediaKind) -> Option<&Arc<VariantGenerator>> {
        match kind {
            MediaKind::Image => self.image_generator.as_ref(),
            MediaKind::Video => self.video_generator.as_ref(),
        }
    }
}
