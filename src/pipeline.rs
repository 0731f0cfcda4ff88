//! The dubbing orchestrator.
//!
//! A [`DubbingPipeline`] owns an ordered list of stages and runs at most one
//! `PipelineRun` at a time. A run goes `Idle -> Running(stage) ->
//! Completed | Failed | Cancelled`; teardown (artifact release, progress
//! reset, guard release) happens exactly once on the way to any terminal
//! state.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactStore, ReleaseReport};
use crate::config::{Config, PipelineConfig};
use crate::error::{DubError, ErrorKind, Result};
use crate::lipsync::{LipSyncFactory, LipSyncTrait};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::request::{PipelineRequest, RequestValidator};
use crate::stage::{PipelineStage, RetryPolicy, StageContext, StageError, StagePayload};
use crate::stages::{CloneVoiceStage, ExtractAudioStage, LipSyncStage, TranscribeStage, TranslateStage};
use crate::transcribe::{TranscriberFactory, TranscriberTrait};
use crate::translate::{Translator, TranslatorFactory};
use crate::voice::{VoiceClonerFactory, VoiceClonerTrait};

/// Reported once the run is set up
pub const START_PERCENT: u8 = 10;
/// Reported after the last stage
pub const COMPLETE_PERCENT: u8 = 100;

const PREPARE_LABEL: &str = "prepare";
const COMPLETE_LABEL: &str = "complete";

/// Checkpoints of the five dubbing stages, weighted toward cloning and sync
pub const DUBBING_CHECKPOINTS: [u8; 5] = [20, 30, 40, 60, 80];

/// Where a run ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunStatus {
    Completed { output: PathBuf },
    Failed(StageFailure),
    Cancelled { after_stage: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub cleanup: ReleaseReport,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match &self.status {
            RunStatus::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.status {
            RunStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Cooperative cancellation request, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Holds the pipeline's single-run slot until dropped.
struct ActiveRunGuard {
    active: Arc<AtomicBool>,
}

impl ActiveRunGuard {
    fn acquire(active: &Arc<AtomicBool>) -> Result<Self> {
        active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DubError::Concurrency)?;
        Ok(Self {
            active: Arc::clone(active),
        })
    }
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

struct RegisteredStage {
    stage: Arc<dyn PipelineStage>,
    checkpoint: u8,
}

/// The external engines the default dubbing stages wrap.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaProcessorTrait>,
    pub transcriber: Arc<dyn TranscriberTrait>,
    pub translator: Arc<dyn Translator>,
    pub voice: Arc<dyn VoiceClonerTrait>,
    pub lipsync: Arc<dyn LipSyncTrait>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Result<Self> {
        let translator = TranslatorFactory::create_translator(
            config.translate.clone(),
            config.pipeline.supported_languages.clone(),
        )?;

        Ok(Self {
            media: Arc::from(MediaProcessorFactory::create_processor(config.media.clone())),
            transcriber: Arc::from(TranscriberFactory::create_default(config.transcriber.clone())),
            translator: Arc::from(translator),
            voice: Arc::from(VoiceClonerFactory::create_default(config.voice.clone())),
            lipsync: Arc::from(LipSyncFactory::create_default(config.lipsync.clone())),
        })
    }
}

pub struct DubbingPipelineBuilder {
    temp_root: PathBuf,
    validator: RequestValidator,
    stages: Vec<RegisteredStage>,
}

impl DubbingPipelineBuilder {
    /// Append a stage that reports `checkpoint` percent when it succeeds
    pub fn stage<S: PipelineStage + 'static>(self, stage: S, checkpoint: u8) -> Self {
        self.shared_stage(Arc::new(stage), checkpoint)
    }

    pub fn shared_stage(mut self, stage: Arc<dyn PipelineStage>, checkpoint: u8) -> Self {
        self.stages.push(RegisteredStage { stage, checkpoint });
        self
    }

    /// Checks the progress schedule: checkpoints must rise strictly and lie
    /// between the start and completion checkpoints.
    pub fn build(self) -> Result<DubbingPipeline> {
        if self.stages.is_empty() {
            return Err(DubError::Config("A pipeline needs at least one stage".to_string()));
        }

        let mut previous = START_PERCENT;
        for registered in &self.stages {
            if registered.checkpoint <= previous || registered.checkpoint >= COMPLETE_PERCENT {
                return Err(DubError::Config(format!(
                    "Checkpoint {}% of stage '{}' must be above {}% and below {}%",
                    registered.checkpoint,
                    registered.stage.name(),
                    previous,
                    COMPLETE_PERCENT
                )));
            }
            previous = registered.checkpoint;
        }

        Ok(DubbingPipeline {
            stages: self.stages.into(),
            temp_root: self.temp_root,
            validator: self.validator,
            active: Arc::new(AtomicBool::new(false)),
        })
    }
}

pub struct DubbingPipeline {
    stages: Arc<[RegisteredStage]>,
    temp_root: PathBuf,
    validator: RequestValidator,
    active: Arc<AtomicBool>,
}

impl DubbingPipeline {
    pub fn builder(config: &PipelineConfig) -> DubbingPipelineBuilder {
        DubbingPipelineBuilder {
            temp_root: config.temp_root.clone(),
            validator: RequestValidator::from_config(config),
            stages: Vec::new(),
        }
    }

    /// The standard extract, transcribe, translate, clone, lip-sync chain
    /// backed by the configured external tools.
    pub fn dubbing(config: &Config) -> Result<Self> {
        Self::with_collaborators(&config.pipeline, Collaborators::from_config(config)?)
    }

    pub fn with_collaborators(config: &PipelineConfig, collaborators: Collaborators) -> Result<Self> {
        let retry = RetryPolicy::new(config.max_retries, config.retry_backoff());
        let [extracted, transcribed, translated, cloned, synced] = DUBBING_CHECKPOINTS;

        Self::builder(config)
            .stage(ExtractAudioStage::new(collaborators.media), extracted)
            .stage(TranscribeStage::new(collaborators.transcriber), transcribed)
            .stage(TranslateStage::new(collaborators.translator, retry), translated)
            .stage(CloneVoiceStage::new(collaborators.voice), cloned)
            .stage(LipSyncStage::new(collaborators.lipsync), synced)
            .build()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|r| r.stage.name()).collect()
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a run on a tokio worker task.
    ///
    /// Fails with `Concurrency` while another run is active, `Validation` for
    /// a bad request and `Storage` when the run directory cannot be created.
    /// In all three cases nothing is left running.
    pub fn start(
        &self,
        request: PipelineRequest,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<RunHandle> {
        let cancel = CancelFlag::default();
        let run = self.prepare(request, cancel.clone())?;
        let run_id = run.id;
        let started_at = run.started_at;

        let join = tokio::spawn(run.execute(Arc::clone(&self.stages), reporter));
        Ok(RunHandle {
            run_id,
            started_at,
            cancel,
            join,
        })
    }

    /// Same as [`start`](Self::start) but awaited on the caller's task.
    pub async fn run(
        &self,
        request: PipelineRequest,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancelFlag,
    ) -> Result<RunOutcome> {
        let run = self.prepare(request, cancel)?;
        Ok(run.execute(Arc::clone(&self.stages), reporter).await)
    }

    fn prepare(&self, request: PipelineRequest, cancel: CancelFlag) -> Result<PipelineRun> {
        let guard = ActiveRunGuard::acquire(&self.active)?;
        self.validator.validate(&request)?;

        let id = Uuid::new_v4();
        let store = ArtifactStore::open(&self.temp_root, id)?;

        Ok(PipelineRun {
            id,
            request,
            store,
            outputs: Vec::new(),
            current_stage: 0,
            progress: 0,
            cancel,
            started_at: Utc::now(),
            started: Instant::now(),
            _guard: guard,
        })
    }
}

/// Caller-side handle of a run started with [`DubbingPipeline::start`].
pub struct RunHandle {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    cancel: CancelFlag,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Ask the run to stop at the next stage boundary. The running stage is
    /// not interrupted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn wait(self) -> RunOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Dubbing worker for run {} died: {}", self.run_id, e);
                RunOutcome {
                    run_id: self.run_id,
                    status: RunStatus::Failed(StageFailure {
                        stage: "pipeline".to_string(),
                        kind: ErrorKind::Internal,
                        message: format!("Worker task failed: {}", e),
                    }),
                    cleanup: ReleaseReport::default(),
                    started_at: self.started_at,
                    elapsed: (Utc::now() - self.started_at).to_std().unwrap_or_default(),
                }
            }
        }
    }
}

/// Mutable state of the one active run. Only the worker task touches it.
struct PipelineRun {
    id: Uuid,
    request: PipelineRequest,
    store: ArtifactStore,
    outputs: Vec<(String, StagePayload)>,
    current_stage: usize,
    progress: u8,
    cancel: CancelFlag,
    started_at: DateTime<Utc>,
    started: Instant,
    _guard: ActiveRunGuard,
}

impl PipelineRun {
    async fn execute(
        mut self,
        stages: Arc<[RegisteredStage]>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> RunOutcome {
        info!(
            "Starting dubbing run {}: {} ({} -> {})",
            self.id,
            self.request.video_path().display(),
            self.request.source_language(),
            self.request.target_language()
        );

        self.emit(reporter.as_ref(), PREPARE_LABEL, START_PERCENT, "Loading video...");
        let status = self.drive(&stages, reporter.as_ref()).await;
        self.teardown(status, reporter.as_ref())
    }

    async fn drive(&mut self, stages: &[RegisteredStage], reporter: &dyn ProgressReporter) -> RunStatus {
        let mut input = StagePayload::Path(self.request.video_path().to_path_buf());
        let mut last_completed: Option<String> = None;

        for (index, registered) in stages.iter().enumerate() {
            let name = registered.stage.name().to_string();
            if self.cancel.is_cancelled() {
                info!("Run {} cancelled before {}", self.id, name);
                return RunStatus::Cancelled {
                    after_stage: last_completed,
                };
            }

            self.current_stage = index;
            info!("Stage {}/{}: {}", index + 1, stages.len(), name);

            let result = {
                let mut ctx = StageContext::new(
                    &name,
                    &self.request,
                    &mut self.store,
                    &input,
                    &self.outputs,
                );
                AssertUnwindSafe(registered.stage.execute(&mut ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(StageError::new(
                            ErrorKind::Internal,
                            format!("Stage panicked: {}", panic_message(panic.as_ref())),
                        ))
                    })
            };

            match result {
                Ok(payload) => {
                    debug!("Stage {} produced a {}", name, payload.type_name());
                    self.progress = registered.checkpoint;
                    self.emit(
                        reporter,
                        &name,
                        registered.checkpoint,
                        &registered.stage.completion_message(),
                    );
                    self.outputs.push((name.clone(), payload.clone()));
                    input = payload;
                    last_completed = Some(name);
                }
                Err(e) => {
                    error!("Stage {} of run {} failed: {}", name, self.id, e);
                    return RunStatus::Failed(StageFailure {
                        stage: name,
                        kind: e.kind,
                        message: e.message,
                    });
                }
            }
        }

        if self.cancel.is_cancelled() {
            info!("Run {} cancelled after its last stage", self.id);
            return RunStatus::Cancelled {
                after_stage: last_completed,
            };
        }

        match input {
            StagePayload::Path(output) if output == self.request.output_path() => {
                self.progress = COMPLETE_PERCENT;
                self.emit(reporter, COMPLETE_LABEL, COMPLETE_PERCENT, "Processing complete!");
                RunStatus::Completed { output }
            }
            StagePayload::Path(output) => RunStatus::Failed(StageFailure {
                stage: last_completed.unwrap_or_default(),
                kind: ErrorKind::Internal,
                message: format!(
                    "Final stage wrote {} instead of the requested output {}",
                    output.display(),
                    self.request.output_path().display()
                ),
            }),
            other => RunStatus::Failed(StageFailure {
                stage: last_completed.unwrap_or_default(),
                kind: ErrorKind::Internal,
                message: format!("Final stage produced a {} instead of a video path", other.type_name()),
            }),
        }
    }

    fn emit(&self, reporter: &dyn ProgressReporter, stage: &str, percent: u8, message: &str) {
        reporter.report(&ProgressEvent {
            stage: stage.to_string(),
            percent,
            message: message.to_string(),
        });
    }

    fn teardown(mut self, status: RunStatus, reporter: &dyn ProgressReporter) -> RunOutcome {
        debug!("Tearing down run {} at {}%", self.id, self.progress);
        let cleanup = self.store.release_all();
        if !cleanup.is_clean() {
            warn!(
                "Run {} left {} artifacts behind after cleanup",
                self.id,
                cleanup.blocked.len()
            );
        }
        self.progress = 0;

        let outcome = RunOutcome {
            run_id: self.id,
            status,
            cleanup,
            started_at: self.started_at,
            elapsed: self.started.elapsed(),
        };
        match &outcome.status {
            RunStatus::Completed { output } => {
                info!("Run {} completed in {:?}: {}", self.id, outcome.elapsed, output.display())
            }
            RunStatus::Failed(failure) => error!(
                "Run {} failed at stage {}/{} ({}): {}",
                self.id,
                self.current_stage + 1,
                failure.stage,
                failure.kind,
                failure.message
            ),
            RunStatus::Cancelled { after_stage } => warn!(
                "Run {} cancelled after {}",
                self.id,
                after_stage.as_deref().unwrap_or("setup")
            ),
        }

        // free the slot before telling the caller, so it may start again
        drop(self);
        reporter.finished(&outcome);
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
