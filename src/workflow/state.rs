use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::subtitle::SubtitleFormat;

/// Where a file currently is in the per-file pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Matching,
    Analyzing,
    Loading,
    Transcribing,
    Translating,
    Synchronizing,
    Formatting,
    Saving,
    Merging,
    Completed,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Matching => "matching",
            Stage::Analyzing => "analyzing",
            Stage::Loading => "loading",
            Stage::Transcribing => "transcribing",
            Stage::Translating => "translating",
            Stage::Synchronizing => "synchronizing",
            Stage::Formatting => "formatting",
            Stage::Saving => "saving",
            Stage::Merging => "merging",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    pub stage: Stage,
    pub current_file: Option<PathBuf>,
    pub progress_current: usize,
    pub progress_total: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Run state shared between the orchestrator (writer) and its caller (reader)
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<WorkflowState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> WorkflowState {
        self.inner.read().clone()
    }

    pub(crate) fn update<F: FnOnce(&mut WorkflowState)>(&self, f: F) {
        f(&mut self.inner.write());
    }
}

/// Cooperative stop request, honoured at file boundaries
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Answer to a `NeedsDecision` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Progress {
        message: String,
        current: usize,
        total: usize,
        stage: Stage,
    },
    /// Rendered excerpt of the track as it currently stands
    Preview { text: String },
    /// The run is paused until a `Decision` arrives
    NeedsDecision { next: PathBuf },
    FileFinished { video: PathBuf, success: bool },
    Warning { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Read from the paired subtitle file
    Loaded,
    Transcribed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub video: PathBuf,
    pub subtitle_path: PathBuf,
    pub format: SubtitleFormat,
    pub source: SourceKind,
    pub entries: usize,
    pub merged_video: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub successes: Vec<FileOutcome>,
    pub skipped: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Stopped early by cancellation or a `Stop` decision
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub(crate) fn started() -> Self {
        let now = Utc::now();
        Self {
            successes: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Event and state writer handed to every stage of a run
#[derive(Debug, Clone)]
pub struct Reporter {
    events: mpsc::UnboundedSender<WorkflowEvent>,
    state: SharedState,
}

impl Reporter {
    pub fn new(events: mpsc::UnboundedSender<WorkflowEvent>, state: SharedState) -> Self {
        Self { events, state }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// A dropped receiver only means nobody is listening.
    pub fn emit(&self, event: WorkflowEvent) {
        let _ = self.events.send(event);
    }

    pub fn stage(&self, stage: Stage, message: impl Into<String>) {
        self.state.update(|s| s.stage = stage);
        let snapshot = self.state.snapshot();
        self.emit(WorkflowEvent::Progress {
            message: message.into(),
            current: snapshot.progress_current,
            total: snapshot.progress_total,
            stage,
        });
    }

    pub fn preview(&self, text: String) {
        self.emit(WorkflowEvent::Preview { text });
    }

    pub fn warn(&self, message: String) {
        tracing::warn!("{}", message);
        self.state.update(|s| s.warnings.push(message.clone()));
        self.emit(WorkflowEvent::Warning { message });
    }

    pub fn fail(&self, message: String) {
        tracing::error!("{}", message);
        self.state.update(|s| {
            s.stage = Stage::Failed;
            s.errors.push(message.clone());
        });
        self.emit(WorkflowEvent::Error { message });
    }
}

/// The orchestrator's end of a run's channels
#[derive(Debug)]
pub struct RunContext {
    pub(crate) reporter: Reporter,
    pub(crate) decisions: mpsc::UnboundedReceiver<Decision>,
    pub(crate) cancel: CancellationFlag,
}

/// The caller's end of a run's channels
#[derive(Debug)]
pub struct RunController {
    pub events: mpsc::UnboundedReceiver<WorkflowEvent>,
    pub decisions: mpsc::UnboundedSender<Decision>,
    pub cancel: CancellationFlag,
    pub state: SharedState,
}

impl RunContext {
    pub fn channel() -> (RunContext, RunController) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (decision_tx, decision_rx) = mpsc::unbounded_channel();
        let cancel = CancellationFlag::new();
        let state = SharedState::new();

        let context = RunContext {
            reporter: Reporter::new(event_tx, state.clone()),
            decisions: decision_rx,
            cancel: cancel.clone(),
        };
        let controller = RunController {
            events: event_rx,
            decisions: decision_tx,
            cancel,
            state,
        };
        (context, controller)
    }

    /// Wait for the caller's answer; a closed channel reads as `Stop`.
    pub(crate) async fn decide(&mut self, next: PathBuf) -> Decision {
        self.reporter.emit(WorkflowEvent::NeedsDecision { next });
        self.decisions.recv().await.unwrap_or(Decision::Stop)
    }
}
