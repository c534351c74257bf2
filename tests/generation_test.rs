use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use mediaslots::config::Config;
use mediaslots::generator::{
    GeneratedImage, GenerationError, GenerationRequest, ImageRequest, MediaBackend,
    OperationHandle, OperationStatus, Sleeper, VariantGenerator, VideoRequest,
};
use mediaslots::manifest::{ClipSeconds, ManifestStore, MediaKind};

type Result<T> = std::result::Result<T, GenerationError>;

/// Image calls fail on the listed call numbers; videos stay pending for
/// `pending_polls` polls, forever when `None`
struct ScriptedBackend {
    failing_calls: Vec<u32>,
    pending_polls: Option<u32>,
    calls: AtomicU32,
    polls: AtomicU32,
}

impl ScriptedBackend {
    fn images(failing_calls: Vec<u32>) -> Self {
        Self {
            failing_calls,
            pending_polls: None,
            calls: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    fn videos(pending_polls: Option<u32>) -> Self {
        Self {
            failing_calls: Vec::new(),
            pending_polls,
            calls: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl MediaBackend for ScriptedBackend {
    async fn generate_image(&self, _request: &ImageRequest) -> Result<GeneratedImage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&call) {
            return Err(GenerationError::HttpStatus {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(GeneratedImage {
            bytes: Bytes::from(format!("image {call}")),
            mime_type: "image/png".to_string(),
        })
    }

    async fn submit_video(&self, _request: &VideoRequest) -> Result<OperationHandle> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OperationHandle {
            name: format!("operations/{call}"),
        })
    }

    async fn poll_video(&self, operation: &OperationHandle) -> Result<OperationStatus> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.pending_polls {
            Some(pending) if poll > pending => Ok(OperationStatus::Completed {
                media_uri: format!("https://media.test/{}", operation.name),
            }),
            _ => Ok(OperationStatus::Pending),
        }
    }

    async fn download(&self, _media_uri: &str) -> Result<Bytes> {
        Ok(Bytes::from_static(b"mp4"))
    }
}

/// Records requested sleeps instead of waiting
#[derive(Default)]
struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.public_dir = temp_dir.path().join("public");
    config.paths.image_manifest = temp_dir.path().join("data/image-manifest.json");
    config.paths.video_manifest = temp_dir.path().join("data/video-manifest.json");
    config
}

#[tokio::test]
async fn test_partial_batch_persists_successes() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let store = Arc::new(ManifestStore::open_file(
        MediaKind::Image,
        &config.paths.image_manifest,
    ));
    let generator = VariantGenerator::new(
        &config,
        MediaKind::Image,
        Arc::new(ScriptedBackend::images(vec![2, 4])),
        store.clone(),
    );

    let request = GenerationRequest::builder()
        .slot("services/ai")
        .prompt("Circuit board macro shot")
        .count(5)
        .build();
    let report = generator.generate(request).await.unwrap();

    assert_eq!(report.requested, 5);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].filename, "services-ai-002.png");

    // Reload from disk: only successful variants are recorded, gaps stay
    let reopened = ManifestStore::open_file(MediaKind::Image, &config.paths.image_manifest);
    let slot = reopened.load().unwrap().slot("services/ai").cloned().unwrap();
    let names: Vec<_> = slot.files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(
        names,
        ["services-ai-001.png", "services-ai-003.png", "services-ai-005.png"]
    );
    assert_eq!(slot.prompt, "Circuit board macro shot");
    assert_eq!(slot.selected, None);
    assert!(
        config
            .paths
            .public_dir
            .join("generated/images/services-ai/services-ai-005.png")
            .exists()
    );

    // A second batch continues after the highest number
    let report = generator
        .generate(GenerationRequest::builder().slot("services/ai").count(1).build())
        .await
        .unwrap();
    assert_eq!(report.files[0].filename, "services-ai-006.png");
}

#[tokio::test]
async fn test_video_times_out_after_bounded_polls() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.video.poll_interval_secs = 10;
    config.video.poll_timeout_secs = 25;

    let backend = Arc::new(ScriptedBackend::videos(None));
    let sleeper = Arc::new(RecordingSleeper::default());
    let generator = VariantGenerator::new(
        &config,
        MediaKind::Video,
        backend.clone(),
        Arc::new(ManifestStore::in_memory(MediaKind::Video)),
    )
    .with_sleeper(sleeper.clone());

    let report = generator
        .generate(
            GenerationRequest::builder()
                .slot("hero")
                .prompt("Slow dolly over a glass desk")
                .count(1)
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failures.len(), 1);
    // ceil(25 / 10) polls, one interval before each
    assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *sleeper.sleeps.lock().unwrap(),
        vec![Duration::from_secs(10); 3]
    );
}

#[tokio::test]
async fn test_video_completes_and_records_duration() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let store = Arc::new(ManifestStore::in_memory(MediaKind::Video));

    let generator = VariantGenerator::new(
        &config,
        MediaKind::Video,
        Arc::new(ScriptedBackend::videos(Some(2))),
        store.clone(),
    )
    .with_sleeper(Arc::new(RecordingSleeper::default()));

    let report = generator
        .generate(
            GenerationRequest::builder()
                .slot("hero")
                .prompt("Slow dolly over a glass desk")
                .count(1)
                .duration(ClipSeconds::new(6).unwrap())
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    let file = &report.files[0];
    assert_eq!(file.filename, "hero-001.mp4");
    assert_eq!(file.path, "/generated/videos/hero/hero-001.mp4");
    assert_eq!(file.duration_seconds.map(|d| d.get()), Some(6));

    let slot = store.load().unwrap().slot("hero").cloned().unwrap();
    assert_eq!(slot.duration.map(|d| d.get()), Some(6));
    assert!(
        config
            .paths
            .public_dir
            .join("generated/videos/hero/hero-001.mp4")
            .exists()
    );
}
