//! Uniform contract every pipeline stage implements.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::artifact::ArtifactStore;
use crate::error::{DubError, ErrorKind};
use crate::request::PipelineRequest;
use crate::transcribe::Transcript;

/// Value a stage hands to the next one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StagePayload {
    Path(PathBuf),
    Text(String),
    Transcript(Transcript),
}

impl StagePayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Text(_) => "text",
            Self::Transcript(_) => "transcript",
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_transcript(&self) -> Option<&Transcript> {
        match self {
            Self::Transcript(t) => Some(t),
            _ => None,
        }
    }
}

/// Classified failure returned across a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a collaborator error. Errors without an intrinsic kind take
    /// `default_kind`.
    pub fn classify(err: DubError, default_kind: ErrorKind) -> Self {
        let kind = err.intrinsic_kind().unwrap_or(default_kind);
        Self::new(kind, err.to_string())
    }
}

pub type StageResult = std::result::Result<StagePayload, StageError>;

/// Everything a stage may look at or allocate while it runs.
pub struct StageContext<'a> {
    stage: &'a str,
    request: &'a PipelineRequest,
    artifacts: &'a mut ArtifactStore,
    input: &'a StagePayload,
    outputs: &'a [(String, StagePayload)],
}

impl<'a> StageContext<'a> {
    pub fn new(
        stage: &'a str,
        request: &'a PipelineRequest,
        artifacts: &'a mut ArtifactStore,
        input: &'a StagePayload,
        outputs: &'a [(String, StagePayload)],
    ) -> Self {
        Self {
            stage,
            request,
            artifacts,
            input,
            outputs,
        }
    }

    pub fn stage(&self) -> &str {
        self.stage
    }

    pub fn request(&self) -> &PipelineRequest {
        self.request
    }

    /// Payload of the immediately preceding stage (the input video path for
    /// the first stage).
    pub fn input(&self) -> &StagePayload {
        self.input
    }

    /// Payload of an earlier stage by label.
    pub fn output_of(&self, stage: &str) -> Option<&StagePayload> {
        self.outputs
            .iter()
            .find(|(label, _)| label == stage)
            .map(|(_, payload)| payload)
    }

    pub fn allocate(&mut self, logical_name: &str, extension: &str) -> Result<PathBuf, StageError> {
        self.artifacts
            .allocate(self.stage, logical_name, extension)
            .map_err(|e| StageError::classify(e, ErrorKind::Storage))
    }

    pub fn input_path(&self) -> Result<PathBuf, StageError> {
        self.input
            .as_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| self.unexpected_input("path"))
    }

    pub fn input_text(&self) -> Result<String, StageError> {
        self.input
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| self.unexpected_input("text"))
    }

    pub fn input_transcript(&self) -> Result<Transcript, StageError> {
        self.input
            .as_transcript()
            .cloned()
            .ok_or_else(|| self.unexpected_input("transcript"))
    }

    fn unexpected_input(&self, expected: &str) -> StageError {
        StageError::new(
            ErrorKind::Internal,
            format!(
                "{} expects a {} input but received a {}",
                self.stage,
                expected,
                self.input.type_name()
            ),
        )
    }
}

/// One discrete step of the dubbing pipeline.
///
/// A stage never touches run state; it returns a [`StageResult`] and may
/// allocate artifacts through the context. Collaborator failures must be
/// classified before they are returned.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stable label, e.g. `clone-voice`.
    fn name(&self) -> &str;

    /// Status line reported once the stage succeeded.
    fn completion_message(&self) -> String {
        format!("{} finished", self.name())
    }

    async fn execute(&self, ctx: &mut StageContext<'_>) -> StageResult;
}

/// Bounded retry with exponential backoff, for stages that talk to flaky
/// collaborators.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: Duration::from_secs(30),
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_backoff`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> crate::error::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts || !is_retryable(&e) => return Err(e),
                Err(e) => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, self.max_attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn is_retryable(err: &DubError) -> bool {
    !matches!(
        err.intrinsic_kind(),
        Some(ErrorKind::Validation) | Some(ErrorKind::Storage) | Some(ErrorKind::Internal)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    #[test]
    fn test_classify_keeps_intrinsic_kind() {
        let err = StageError::classify(DubError::Storage("full".into()), ErrorKind::Synthesis);
        assert_eq!(err.kind, ErrorKind::Storage);

        let err = StageError::classify(std::io::Error::other("pipe").into(), ErrorKind::Synthesis);
        assert_eq!(err.kind, ErrorKind::Synthesis);
        assert!(err.message.contains("pipe"));
    }

    #[test]
    fn test_context_input_mismatch_is_internal() {
        let root = tempfile::tempdir().unwrap();
        let mut store = ArtifactStore::open(root.path(), Uuid::new_v4()).unwrap();
        let request = PipelineRequest::new("a.mp4", "b.wav", "c.mp4", "en", "hi");
        let input = StagePayload::Text("hello".to_string());
        let outputs = vec![("extract-audio".to_string(), StagePayload::Path("x.wav".into()))];

        let mut ctx = StageContext::new("transcribe", &request, &mut store, &input, &outputs);
        let err = ctx.input_path().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(ctx.input_text().unwrap(), "hello");
        assert_eq!(
            ctx.output_of("extract-audio").and_then(StagePayload::as_path),
            Some(Path::new("x.wav"))
        );

        let path = ctx.allocate("audio", "wav").unwrap();
        assert!(path.starts_with(root.path()));
        drop(ctx);
        assert_eq!(store.artifacts()[0].stage, "transcribe");
        store.release_all();
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));

        let slow = RetryPolicy::new(3, Duration::from_secs(60));
        assert_eq!(slow.backoff(1), slow.max_backoff);
        assert_eq!(slow.backoff(40), slow.max_backoff);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let value = policy
            .run("translate", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DubError::Translation("busy".into()))
                } else {
                    Ok("ok")
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: crate::error::Result<()> = policy
            .run("translate", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DubError::Translation("down".into()))
            })
            .await;

        assert!(matches!(result, Err(DubError::Translation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let result: crate::error::Result<()> = policy
            .run("translate", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DubError::Validation("bad language".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
