//! Progress events pushed out of a run.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::pipeline::{RunOutcome, RunStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub percent: u8,
    pub message: String,
}

/// Fire-and-forget sink for run progress.
///
/// `report` is called in stage order with non-decreasing percentages.
/// `finished` is called once, after teardown, when the pipeline is already
/// free to accept the next run.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);

    fn finished(&self, _outcome: &RunOutcome) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn report(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Writes progress to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, event: &ProgressEvent) {
        info!("[{:>3}%] {}: {}", event.percent, event.stage, event.message);
    }

    fn finished(&self, outcome: &RunOutcome) {
        match &outcome.status {
            RunStatus::Completed { output } => {
                info!("Dubbing completed: {}", output.display())
            }
            RunStatus::Failed(failure) => error!(
                "Dubbing failed at {} ({}): {}",
                failure.stage, failure.kind, failure.message
            ),
            RunStatus::Cancelled { .. } => warn!("Dubbing cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunUpdate {
    Progress(ProgressEvent),
    Finished(RunOutcome),
}

/// Forwards progress into a channel, for callers running their own event
/// loop (e.g. a UI thread).
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<RunUpdate>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: &ProgressEvent) {
        // a dropped receiver just means nobody is listening any more
        let _ = self.tx.send(RunUpdate::Progress(event.clone()));
    }

    fn finished(&self, outcome: &RunOutcome) {
        let _ = self.tx.send(RunUpdate::Finished(outcome.clone()));
    }
}

/// Terminal progress bar
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

impl ProgressBarReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(200));
        Self { bar }
    }
}

impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressBarReporter {
    fn report(&self, event: &ProgressEvent) {
        self.bar.set_position(event.percent as u64);
        self.bar.set_message(event.message.clone());
    }

    fn finished(&self, outcome: &RunOutcome) {
        match &outcome.status {
            RunStatus::Completed { output } => self
                .bar
                .finish_with_message(format!("Done: {}", output.display())),
            RunStatus::Failed(failure) => self
                .bar
                .abandon_with_message(format!("Failed at {}: {}", failure.stage, failure.message)),
            RunStatus::Cancelled { .. } => self.bar.abandon_with_message("Cancelled"),
        }
    }
}
