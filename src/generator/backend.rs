//! Seams between the batch runner and the outside world
//!
//! [`MediaBackend`] is the opaque generation API; [`Sleeper`] is the only
//! clock the video poll loop sees. Both are swapped for scripted fakes in tests.

use super::Result;
use crate::manifest::{AspectRatio, ClipSeconds};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub aspect: AspectRatio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub aspect: AspectRatio,
    pub duration: ClipSeconds,
}

/// Decoded inline image returned by a synchronous generation call
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Handle of a submitted long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
}

/// Operation state as reported by one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Failed(String),
    Completed { media_uri: String },
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage>;

    async fn submit_video(&self, request: &VideoRequest) -> Result<OperationHandle>;

    async fn poll_video(&self, operation: &OperationHandle) -> Result<OperationStatus>;

    /// Fetch the artifact a completed operation points at
    async fn download(&self, media_uri: &str) -> Result<Bytes>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeper
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
