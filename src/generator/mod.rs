//! Variant generation against the external generative-media API
//!
//! Images are a single request/response round trip. Videos are a
//! long-running operation: submit, poll on a fixed interval until done or
//! the timeout elapses, then download the produced clip.
//!
//! Variants of one batch run sequentially. A failed variant is logged and
//! counted, never fatal to the batch; only an unusable setup (missing API
//! credential, invalid request) aborts before work starts.

pub mod backend;
pub mod gemini;
pub mod http;
pub mod poll;
pub mod runner;

pub use backend::{
    GeneratedImage, ImageRequest, MediaBackend, OperationHandle, OperationStatus, Sleeper,
    TokioSleeper, VideoRequest,
};
pub use gemini::GeminiBackend;
pub use poll::{run_video_job, PollPolicy, VideoJobState};
pub use runner::{BatchReport, GenerationRequest, VariantFailure, VariantGenerator};

use crate::humanize::ByteSize;
use crate::manifest::ManifestError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Missing API credential: set GEMINI_API_KEY (or GOOGLE_API_KEY)")]
    MissingCredential,

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response contained no {0}")]
    MissingMedia(&'static str),

    #[error("Operation {operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },

    #[error("Operation {operation} not done after {attempts} polls ({waited:?})")]
    TimedOut {
        operation: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("Download of {size} exceeds limit of {limit}")]
    DownloadTooLarge { size: ByteSize, limit: ByteSize },

    /// Target file already exists, e.g. written for another slot sharing the directory
    #[error("Artifact already exists at {}", .0.display())]
    ArtifactExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl GenerationError {
    /// Worth another attempt: transport failures, throttling, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) => true,
            GenerationError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Errors that abort the batch instead of failing one variant
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenerationError::MissingCredential
                | GenerationError::InvalidRequest(_)
                | GenerationError::Manifest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Transport("reset".into()).is_transient());
        assert!(
            GenerationError::HttpStatus {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            GenerationError::HttpStatus {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !GenerationError::HttpStatus {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!GenerationError::MissingMedia("inline image data").is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(GenerationError::MissingCredential.is_fatal());
        assert!(GenerationError::InvalidRequest("count".into()).is_fatal());
        assert!(!GenerationError::MalformedResponse("x".into()).is_fatal());
    }
}
