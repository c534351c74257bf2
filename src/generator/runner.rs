//! Batch runner: generates variants one at a time and records each in the manifest

use super::backend::{ImageRequest, MediaBackend, Sleeper, TokioSleeper, VideoRequest};
use super::poll::{run_video_job, PollPolicy};
use super::{GenerationError, Result};
use crate::config::Config;
use crate::manifest::naming::{default_base_name, public_path, slot_dir, variant_filename};
use crate::manifest::{
    AspectRatio, ClipSeconds, GeneratedFile, ManifestError, ManifestStore, MediaKind,
    SlotSettings,
};
use crate::observability::Metrics;
use bon::Builder;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// One batch of variants for a slot
///
/// Unset fields fall back to the kind's configured defaults; an unset
/// prompt reuses the slot's stored prompt.
#[derive(Debug, Clone, Builder)]
pub struct GenerationRequest {
    #[builder(into)]
    pub slot: String,
    #[builder(into)]
    pub prompt: Option<String>,
    pub count: Option<u32>,
    pub aspect: Option<AspectRatio>,
    pub duration: Option<ClipSeconds>,
    /// Base filename instead of the slot-derived one
    #[builder(into)]
    pub name: Option<String>,
    /// Output directory below the public dir instead of the configured one
    #[builder(into)]
    pub out_dir: Option<String>,
    /// When false the prompt is used for this batch only
    #[builder(default = true)]
    pub persist_prompt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantFailure {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub kind: MediaKind,
    pub slot: String,
    pub requested: u32,
    pub succeeded: u32,
    pub files: Vec<GeneratedFile>,
    pub failures: Vec<VariantFailure>,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{}/{} {} variants generated for slot '{}'",
            self.succeeded, self.requested, self.kind, self.slot
        )
    }
}

/// Request with every default applied and checked
#[derive(Debug)]
struct BatchPlan {
    slot: String,
    prompt: String,
    count: u32,
    aspect: AspectRatio,
    duration: Option<ClipSeconds>,
    base_name: String,
    out_dir: String,
    persist_prompt: bool,
}

pub struct VariantGenerator {
    kind: MediaKind,
    backend: Arc<dyn MediaBackend>,
    store: Arc<ManifestStore>,
    sleeper: Arc<dyn Sleeper>,
    metrics: Arc<Metrics>,
    public_dir: PathBuf,
    model: String,
    output_dir: String,
    default_count: u32,
    default_aspect: AspectRatio,
    default_duration: Option<ClipSeconds>,
    poll_policy: PollPolicy,
}

impl VariantGenerator {
    pub fn new(
        config: &Config,
        kind: MediaKind,
        backend: Arc<dyn MediaBackend>,
        store: Arc<ManifestStore>,
    ) -> Self {
        let settings = config.kind_settings(kind);
        Self {
            kind,
            backend,
            store,
            sleeper: Arc::new(TokioSleeper),
            metrics: Arc::new(Metrics::new()),
            public_dir: config.paths.public_dir.clone(),
            model: settings.model.to_string(),
            output_dir: settings.output_dir.to_string(),
            default_count: settings.default_count,
            default_aspect: settings.default_aspect,
            default_duration: settings.default_duration,
            poll_policy: PollPolicy::from_config(&config.video),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<ManifestStore> {
        &self.store
    }

    /// Generate `count` variants sequentially, persisting after each success
    ///
    /// Individual variant failures are collected in the report. Only an
    /// invalid request or a manifest error aborts the batch.
    pub async fn generate(&self, request: GenerationRequest) -> Result<BatchReport> {
        let plan = self.plan(request).await?;

        info!(
            kind = %self.kind,
            slot = %plan.slot,
            count = plan.count,
            aspect = %plan.aspect,
            "Starting generation batch"
        );

        let (slot, prompt, model) = (plan.slot.clone(), plan.prompt.clone(), self.model.clone());
        let (aspect, duration, persist_prompt) = (plan.aspect, plan.duration, plan.persist_prompt);
        self.store
            .blocking(move |store| {
                let settings = SlotSettings {
                    prompt: &prompt,
                    model: &model,
                    aspect,
                    duration,
                    persist_prompt,
                };
                store.update(|manifest| {
                    manifest.ensure_slot(&slot, &settings);
                    Ok(())
                })
            })
            .await?;

        let mut report = BatchReport {
            kind: self.kind,
            slot: plan.slot.clone(),
            requested: plan.count,
            succeeded: 0,
            files: Vec::new(),
            failures: Vec::new(),
        };

        let mut counter = 0;
        for _ in 0..plan.count {
            let sequence = self.next_sequence(&plan.slot, counter).await?;
            // Failed numbers are skipped, never reused within the batch
            counter = sequence + 1;
            let filename = variant_filename(&plan.base_name, sequence, self.kind.extension());

            match self.generate_variant(&plan, &filename).await {
                Ok(file) => {
                    self.record(&plan.slot, file.clone()).await?;
                    self.metrics.variant_generated();
                    info!(slot = %plan.slot, filename = %filename, path = %file.path, "Variant generated");
                    report.files.push(file);
                    report.succeeded += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.metrics.variant_failed();
                    warn!(slot = %plan.slot, filename = %filename, error = %e, "Variant failed");
                    report.failures.push(VariantFailure {
                        filename,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            slot = %plan.slot,
            succeeded = report.succeeded,
            requested = report.requested,
            "Generation batch finished"
        );
        Ok(report)
    }

    async fn plan(&self, request: GenerationRequest) -> Result<BatchPlan> {
        let slot = request.slot.trim().to_string();
        check_path_component("slot", &slot)?;

        let count = request.count.unwrap_or(self.default_count);
        if count == 0 {
            return Err(GenerationError::InvalidRequest(
                "count must be at least 1".to_string(),
            ));
        }

        let aspect = request.aspect.unwrap_or(self.default_aspect);
        if !self.kind.allows(aspect) {
            return Err(GenerationError::InvalidRequest(format!(
                "aspect {aspect} is not supported for {} generation",
                self.kind
            )));
        }

        let duration = match self.kind {
            MediaKind::Video => request.duration.or(self.default_duration),
            MediaKind::Image if request.duration.is_some() => {
                return Err(GenerationError::InvalidRequest(
                    "duration only applies to video".to_string(),
                ));
            }
            MediaKind::Image => None,
        };

        let prompt = match request.prompt.filter(|p| !p.trim().is_empty()) {
            Some(prompt) => prompt,
            None => self
                .store
                .blocking(|store| store.load())
                .await?
                .slot(&slot)
                .map(|s| s.prompt.clone())
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| {
                    GenerationError::InvalidRequest(format!(
                        "no prompt given and slot '{slot}' has none stored"
                    ))
                })?,
        };

        let base_name = match request.name {
            Some(name) => {
                check_path_component("name", &name)?;
                if name.contains('/') {
                    return Err(GenerationError::InvalidRequest(
                        "name must not contain '/'".to_string(),
                    ));
                }
                name
            }
            None => default_base_name(&slot),
        };

        let out_dir = request.out_dir.unwrap_or_else(|| self.output_dir.clone());
        check_path_component("out", &out_dir)?;

        Ok(BatchPlan {
            slot,
            prompt,
            count,
            aspect,
            duration,
            base_name,
            out_dir,
            persist_prompt: request.persist_prompt,
        })
    }

    /// Max of the batch counter and the freshly stored max suffix + 1
    async fn next_sequence(&self, slot: &str, counter: u32) -> Result<u32> {
        let manifest = self.store.blocking(|store| store.load()).await?;
        let stored = manifest.slot(slot).map_or(1, |s| s.next_sequence());
        Ok(stored.max(counter))
    }

    async fn generate_variant(&self, plan: &BatchPlan, filename: &str) -> Result<GeneratedFile> {
        let bytes = match self.kind {
            MediaKind::Image => {
                let image = self
                    .backend
                    .generate_image(&ImageRequest {
                        model: self.model.clone(),
                        prompt: plan.prompt.clone(),
                        aspect: plan.aspect,
                    })
                    .await?;
                debug!(mime_type = %image.mime_type, size = image.bytes.len(), "Image received");
                image.bytes
            }
            MediaKind::Video => {
                let request = VideoRequest {
                    model: self.model.clone(),
                    prompt: plan.prompt.clone(),
                    aspect: plan.aspect,
                    duration: plan.duration.unwrap_or(ClipSeconds::LONGEST),
                };
                run_video_job(
                    self.backend.as_ref(),
                    self.sleeper.as_ref(),
                    &self.poll_policy,
                    &request,
                )
                .await?
            }
        };

        let target = self
            .public_dir
            .join(plan.out_dir.trim_matches('/'))
            .join(slot_dir(&plan.slot))
            .join(filename);
        write_artifact(&target, &bytes).await?;

        Ok(GeneratedFile {
            filename: filename.to_string(),
            path: public_path(&plan.out_dir, &plan.slot, filename),
            generated_at: Utc::now(),
            duration_seconds: plan.duration,
        })
    }

    async fn record(&self, slot: &str, file: GeneratedFile) -> Result<()> {
        let slot = slot.to_string();
        self.store
            .blocking(move |store| {
                store.update(|manifest| {
                    let entry = manifest
                        .slot_mut(&slot)
                        .ok_or_else(|| ManifestError::SlotNotFound(slot.clone()))?;
                    // A concurrent writer may have recorded the same number meanwhile
                    match entry.index_of(&file.filename) {
                        Some(index) => entry.files[index] = file.clone(),
                        None => entry.files.push(file.clone()),
                    }
                    entry.touch();
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }
}

/// Write a new artifact, never replacing an existing file
///
/// Distinct slots can map to the same directory (`services/ai` and
/// `services-ai`), so an existing file belongs to someone else.
async fn write_artifact(target: &Path, bytes: &Bytes) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(GenerationError::ArtifactExists(target.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(bytes).await?;
    file.flush().await?;
    debug!(path = %target.display(), size = bytes.len(), "Artifact written");
    Ok(())
}

fn check_path_component(field: &str, value: &str) -> Result<()> {
    let invalid = value.trim().is_empty()
        || value.contains('\\')
        || value.split('/').any(|segment| segment == ".." || segment == ".");
    if invalid {
        return Err(GenerationError::InvalidRequest(format!(
            "{field} '{value}' is not a usable path segment"
        )));
    }
    Ok(())
}
