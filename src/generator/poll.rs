//! Video operation poll loop
//!
//! ```text
//! Submitted ──poll──▶ Polling ──poll──▶ Polling ...
//!     │                  │
//!     └──────────────────┴──▶ Succeeded | Failed | TimedOut
//! ```
//!
//! The loop sleeps one interval before every poll and gives up after
//! `ceil(timeout / interval)` polls. A poll that errors at the transport
//! level fails the job outright; only the final download retries.

use super::backend::{MediaBackend, OperationHandle, OperationStatus, Sleeper, VideoRequest};
use super::{GenerationError, Result};
use crate::config::VideoConfig;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_config(video: &VideoConfig) -> Self {
        Self::new(video.poll_interval(), video.poll_timeout())
    }

    /// Polls allowed before the job counts as timed out, never less than one
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis();
        if interval == 0 {
            return 1;
        }
        let attempts = self.timeout.as_millis().div_ceil(interval).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(300))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoJobState {
    Submitted {
        operation: OperationHandle,
    },
    Polling {
        operation: OperationHandle,
        attempts: u32,
    },
    Succeeded {
        media_uri: String,
    },
    Failed {
        operation: String,
        reason: String,
    },
    TimedOut {
        operation: String,
        attempts: u32,
    },
}

impl VideoJobState {
    pub fn submitted(operation: OperationHandle) -> Self {
        VideoJobState::Submitted { operation }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VideoJobState::Succeeded { .. }
                | VideoJobState::Failed { .. }
                | VideoJobState::TimedOut { .. }
        )
    }

    /// Transition on the result of one poll
    pub fn on_poll(self, status: OperationStatus, policy: &PollPolicy) -> Self {
        let (operation, attempts) = match self {
            VideoJobState::Submitted { operation } => (operation, 1),
            VideoJobState::Polling {
                operation,
                attempts,
            } => (operation, attempts + 1),
            terminal => return terminal,
        };

        match status {
            OperationStatus::Completed { media_uri } => VideoJobState::Succeeded { media_uri },
            OperationStatus::Failed(reason) => VideoJobState::Failed {
                operation: operation.name,
                reason,
            },
            OperationStatus::Pending if attempts >= policy.max_attempts() => {
                VideoJobState::TimedOut {
                    operation: operation.name,
                    attempts,
                }
            }
            OperationStatus::Pending => VideoJobState::Polling {
                operation,
                attempts,
            },
        }
    }
}

/// Submit one video, poll it to a terminal state and download the clip
pub async fn run_video_job(
    backend: &dyn MediaBackend,
    sleeper: &dyn Sleeper,
    policy: &PollPolicy,
    request: &VideoRequest,
) -> Result<Bytes> {
    let operation = backend.submit_video(request).await?;
    info!(operation = %operation.name, "Video generation started");

    let mut state = VideoJobState::submitted(operation);
    loop {
        let operation = match state {
            VideoJobState::Succeeded { media_uri } => {
                debug!("Video ready, downloading");
                return backend.download(&media_uri).await;
            }
            VideoJobState::Failed { operation, reason } => {
                warn!(operation = %operation, reason = %reason, "Video operation failed");
                return Err(GenerationError::OperationFailed { operation, reason });
            }
            VideoJobState::TimedOut {
                operation,
                attempts,
            } => {
                warn!(operation = %operation, attempts, "Video operation timed out");
                return Err(GenerationError::TimedOut {
                    operation,
                    attempts,
                    waited: policy.interval * attempts,
                });
            }
            VideoJobState::Submitted { ref operation }
            | VideoJobState::Polling { ref operation, .. } => operation.clone(),
        };

        sleeper.sleep(policy.interval).await;
        let status = backend.poll_video(&operation).await?;
        state = state.on_poll(status, policy);

        if let VideoJobState::Polling { attempts, .. } = &state {
            debug!(operation = %operation.name, attempts, "Video still rendering");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::backend::{GeneratedImage, ImageRequest};
    use crate::manifest::{AspectRatio, ClipSeconds};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn handle() -> OperationHandle {
        OperationHandle {
            name: "operations/1".to_string(),
        }
    }

    fn request() -> VideoRequest {
        VideoRequest {
            model: "veo".to_string(),
            prompt: "Drone shot".to_string(),
            aspect: AspectRatio::Landscape,
            duration: ClipSeconds::LONGEST,
        }
    }

    /// Replays scripted poll results, then reports Pending forever
    struct ScriptedBackend {
        polls: Mutex<VecDeque<Result<OperationStatus>>>,
        poll_count: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(polls: Vec<Result<OperationStatus>>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                poll_count: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaBackend for ScriptedBackend {
        async fn generate_image(&self, _request: &ImageRequest) -> Result<GeneratedImage> {
            unimplemented!("video only")
        }

        async fn submit_video(&self, _request: &VideoRequest) -> Result<OperationHandle> {
            Ok(handle())
        }

        async fn poll_video(&self, _operation: &OperationHandle) -> Result<OperationStatus> {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(OperationStatus::Pending))
        }

        async fn download(&self, media_uri: &str) -> Result<Bytes> {
            Ok(Bytes::from(format!("clip from {media_uri}")))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn test_max_attempts_is_ceiling() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts(), 30);

        let policy = PollPolicy::new(Duration::from_secs(7), Duration::from_secs(30));
        assert_eq!(policy.max_attempts(), 5);

        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(5));
        assert_eq!(policy.max_attempts(), 1);

        let policy = PollPolicy::new(Duration::ZERO, Duration::from_secs(5));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_state_transitions() {
        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(30));

        let state = VideoJobState::submitted(handle()).on_poll(OperationStatus::Pending, &policy);
        assert_eq!(
            state,
            VideoJobState::Polling {
                operation: handle(),
                attempts: 1
            }
        );

        let done = state.clone().on_poll(
            OperationStatus::Completed {
                media_uri: "uri".to_string(),
            },
            &policy,
        );
        assert_eq!(
            done,
            VideoJobState::Succeeded {
                media_uri: "uri".to_string()
            }
        );

        let failed = state.on_poll(OperationStatus::Failed("blocked".to_string()), &policy);
        assert!(matches!(failed, VideoJobState::Failed { ref reason, .. } if reason == "blocked"));
    }

    #[test]
    fn test_times_out_on_last_allowed_poll() {
        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(30));

        let mut state = VideoJobState::submitted(handle());
        for _ in 0..3 {
            assert!(!state.is_terminal());
            state = state.on_poll(OperationStatus::Pending, &policy);
        }
        assert_eq!(
            state,
            VideoJobState::TimedOut {
                operation: "operations/1".to_string(),
                attempts: 3
            }
        );
    }

    #[test]
    fn test_terminal_state_ignores_polls() {
        let policy = PollPolicy::default();
        let state = VideoJobState::Succeeded {
            media_uri: "uri".to_string(),
        };
        assert_eq!(
            state.clone().on_poll(OperationStatus::Pending, &policy),
            state
        );
    }

    #[tokio::test]
    async fn test_run_video_job_downloads_result() {
        let backend = ScriptedBackend::new(vec![
            Ok(OperationStatus::Pending),
            Ok(OperationStatus::Completed {
                media_uri: "https://media/clip".to_string(),
            }),
        ]);
        let sleeper = RecordingSleeper::default();
        let policy = PollPolicy::default();

        let bytes = run_video_job(&backend, &sleeper, &policy, &request())
            .await
            .unwrap();

        assert_eq!(&bytes[..], b"clip from https://media/clip");
        assert_eq!(backend.poll_count.load(Ordering::SeqCst), 2);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![Duration::from_secs(10); 2]
        );
    }

    #[tokio::test]
    async fn test_run_video_job_times_out() {
        let backend = ScriptedBackend::new(vec![]);
        let sleeper = RecordingSleeper::default();
        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(45));

        let err = run_video_job(&backend, &sleeper, &policy, &request())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::TimedOut { attempts: 5, .. }));
        assert_eq!(backend.poll_count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_poll_error_fails_without_retry() {
        let backend = ScriptedBackend::new(vec![Err(GenerationError::Transport(
            "connection reset".to_string(),
        ))]);
        let sleeper = RecordingSleeper::default();

        let err = run_video_job(&backend, &sleeper, &PollPolicy::default(), &request())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Transport(_)));
        assert_eq!(backend.poll_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_operation_error_reported() {
        let backend = ScriptedBackend::new(vec![Ok(OperationStatus::Failed(
            "safety filter".to_string(),
        ))]);
        let sleeper = RecordingSleeper::default();

        let err = run_video_job(&backend, &sleeper, &PollPolicy::default(), &request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::OperationFailed { ref reason, .. } if reason == "safety filter"
        ));
    }
}
