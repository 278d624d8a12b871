//! Export runs and the conflict-resolution gate
//!
//! `Exporter::plan` resolves every task and checks the destination; nothing
//! is written until `ExportRun::execute` is called, and `ExportRun::cancel`
//! drops the run without touching the sink. Every state transition is also
//! sent to the channel registered with `Exporter::with_progress`.

use super::sink::Sink;
use super::task::{ExportTask, plan_tasks};
use crate::flatten::Ghostscript;
use crate::naming::NamingContext;
use crate::options::ExportOptions;
use crate::render::{RenderJob, Renderer};
use crate::source::SourceDocument;
use crate::types::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// How surviving tasks are rendered and written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExecutionMode {
    /// One task at a time, sharing the decoded source
    #[default]
    Sequential,
    /// Up to `workers` tasks at once, each decoding its own copy of the source
    Concurrent { workers: usize },
}

/// Lifecycle of an export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    /// No run in progress: cancelled, or aborted by a whole-run error
    Idle,
    /// Resolving output paths and checking the destination
    Planning,
    NoConflicts,
    AwaitingUserDecision,
    /// Rendering and writing the surviving tasks
    Writing,
    /// Every surviving task was written
    Done,
    /// At least one task failed
    Reported,
}

/// Resolved output path of one task and its overwrite decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub task_index: usize,
    pub path: PathBuf,
    /// The path already exists at the destination
    pub is_conflict: bool,
    pub should_overwrite: bool,
}

impl ConflictEntry {
    fn proceeds(&self) -> bool {
        !self.is_conflict || self.should_overwrite
    }
}

/// A task that could not be rendered or written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_index: usize,
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of an executed run, ordered by task order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    /// Existing files the caller chose not to overwrite
    pub skipped: Vec<PathBuf>,
    pub errors: Vec<TaskFailure>,
    pub state: ExportState,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Plans export runs against one renderer and one sink
pub struct Exporter<R, S> {
    renderer: Arc<R>,
    sink: Arc<S>,
    ghostscript: Arc<Ghostscript>,
    progress: Option<mpsc::UnboundedSender<ExportState>>,
}

impl<R, S> Clone for Exporter<R, S> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
            sink: Arc::clone(&self.sink),
            ghostscript: Arc::clone(&self.ghostscript),
            progress: self.progress.clone(),
        }
    }
}

impl<R: Renderer, S: Sink> Exporter<R, S> {
    pub fn new(renderer: R, sink: S) -> Self {
        Self {
            renderer: Arc::new(renderer),
            sink: Arc::new(sink),
            ghostscript: Arc::new(Ghostscript::default()),
            progress: None,
        }
    }

    /// Flatten with these Ghostscript executables instead of the defaults
    pub fn with_ghostscript(mut self, ghostscript: Ghostscript) -> Self {
        self.ghostscript = Arc::new(ghostscript);
        self
    }

    /// Report every state transition of runs planned by this exporter
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<ExportState>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn notify(&self, state: ExportState) {
        log::debug!("Export state: {:?}", state);
        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody is watching
            let _ = progress.send(state);
        }
    }

    /// Resolve all tasks and check the destination for existing files.
    ///
    /// Fails as a whole when the options are invalid or any output path cannot
    /// be resolved. No sink writes happen here.
    pub async fn plan(
        &self,
        source: SourceDocument,
        options: &ExportOptions,
        context: &NamingContext,
    ) -> Result<ExportRun<R, S>> {
        self.notify(ExportState::Planning);
        let planned = self.resolve(&source, options, context).await;
        let (tasks, entries) = match planned {
            Ok(planned) => planned,
            Err(e) => {
                self.notify(ExportState::Idle);
                return Err(e);
            }
        };

        let state = if entries.iter().any(|entry| entry.is_conflict) {
            ExportState::AwaitingUserDecision
        } else {
            ExportState::NoConflicts
        };
        log::info!(
            "Planned {} task(s), {} conflict(s)",
            tasks.len(),
            entries.iter().filter(|entry| entry.is_conflict).count()
        );
        self.notify(state);

        Ok(ExportRun {
            exporter: self.clone(),
            source: Arc::new(source),
            tasks,
            entries,
            destination: options.destination(),
            background: options.background,
            flatten: options.flatten,
            execution: options.execution,
            state,
        })
    }

    async fn resolve(
        &self,
        source: &SourceDocument,
        options: &ExportOptions,
        context: &NamingContext,
    ) -> Result<(Vec<ExportTask>, Vec<ConflictEntry>)> {
        options.validate()?;
        let tasks = plan_tasks(source, options, context)?;

        let paths: Vec<PathBuf> = tasks.iter().map(|task| task.path.clone()).collect();
        let existing = self.sink.exists_all(&paths).await?;
        let entries: Vec<ConflictEntry> = tasks
            .iter()
            .zip(existing)
            .map(|(task, exists)| ConflictEntry {
                task_index: task.index,
                path: task.path.clone(),
                is_conflict: exists,
                should_overwrite: true,
            })
            .collect();
        Ok((tasks, entries))
    }
}

/// A planned run waiting for execution or cancellation
pub struct ExportRun<R, S> {
    exporter: Exporter<R, S>,
    source: Arc<SourceDocument>,
    tasks: Vec<ExportTask>,
    entries: Vec<ConflictEntry>,
    destination: PathBuf,
    background: Color,
    flatten: bool,
    execution: ExecutionMode,
    state: ExportState,
}

impl<R: Renderer, S: Sink> ExportRun<R, S> {
    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn tasks(&self) -> &[ExportTask] {
        &self.tasks
    }

    /// One entry per task, conflicting or not
    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    /// Entries whose path already exists
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictEntry> {
        self.entries.iter().filter(|entry| entry.is_conflict)
    }

    /// Set the overwrite decision for one path. Returns `false` if no task
    /// resolves to it.
    pub fn set_overwrite(&mut self, path: &Path, overwrite: bool) -> bool {
        match self.entries.iter_mut().find(|entry| entry.path == path) {
            Some(entry) => {
                entry.should_overwrite = overwrite;
                true
            }
            None => false,
        }
    }

    pub fn overwrite_all(&mut self, overwrite: bool) {
        for entry in &mut self.entries {
            entry.should_overwrite = overwrite;
        }
    }

    /// Abandon the run. Nothing has been written and nothing will be.
    pub fn cancel(self) -> ExportState {
        log::info!("Export cancelled, {} task(s) dropped", self.tasks.len());
        self.exporter.notify(ExportState::Idle);
        ExportState::Idle
    }

    /// Render and write every task that has no conflict or may overwrite.
    ///
    /// PDF outputs are flattened first when the options asked for it. Per-task
    /// failures are collected in the report; only failing to create the
    /// destination directory aborts the run.
    pub async fn execute(self) -> Result<ExportReport> {
        let ExportRun {
            exporter,
            source,
            tasks,
            entries,
            destination,
            background,
            flatten,
            execution,
            ..
        } = self;
        exporter.notify(ExportState::Writing);

        let mut skipped = Vec::new();
        let mut pending = Vec::new();
        for (task, entry) in tasks.into_iter().zip(&entries) {
            if entry.proceeds() {
                pending.push(task);
            } else {
                log::warn!("Skipping existing file {}", entry.path.display());
                skipped.push(entry.path.clone());
            }
        }

        if !pending.is_empty() {
            if let Err(e) = exporter.sink.create_dir_all(&destination).await {
                exporter.notify(ExportState::Idle);
                return Err(e);
            }
        }
        log::info!(
            "Writing {} file(s) to {}",
            pending.len(),
            destination.display()
        );

        let flattener = flatten.then(|| Arc::clone(&exporter.ghostscript));
        let outcomes = match execution {
            ExecutionMode::Sequential => {
                run_sequential(&exporter, &source, pending, background, flattener.as_deref()).await
            }
            ExecutionMode::Concurrent { workers } => {
                run_concurrent(&exporter, &source, pending, background, flattener, workers).await
            }
        };

        let mut written = Vec::new();
        let mut errors = Vec::new();
        for (task_index, path, outcome) in outcomes {
            match outcome {
                Ok(()) => written.push(path),
                Err(e) => {
                    log::warn!("Failed to export {}: {}", path.display(), e);
                    errors.push(TaskFailure {
                        task_index,
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }

        let state = if errors.is_empty() {
            ExportState::Done
        } else {
            ExportState::Reported
        };
        log::info!(
            "Export finished: {} written, {} skipped, {} failed",
            written.len(),
            skipped.len(),
            errors.len()
        );
        exporter.notify(state);

        Ok(ExportReport {
            written,
            skipped,
            errors,
            state,
        })
    }
}

type Outcome = (usize, PathBuf, Result<()>);

async fn run_sequential<R: Renderer, S: Sink>(
    exporter: &Exporter<R, S>,
    source: &Arc<SourceDocument>,
    tasks: Vec<ExportTask>,
    background: Color,
    flattener: Option<&Ghostscript>,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        log::debug!("Rendering task {} -> {}", task.index, task.path.display());
        let job = task.render_job(background);
        let rendered = render_shared(Arc::clone(&exporter.renderer), Arc::clone(source), job).await;
        let outcome = match rendered {
            Ok(bytes) => deliver(exporter.sink.as_ref(), flattener, &task, bytes).await,
            Err(e) => Err(e),
        };
        outcomes.push((task.index, task.path, outcome));
    }
    outcomes
}

async fn run_concurrent<R: Renderer, S: Sink>(
    exporter: &Exporter<R, S>,
    source: &Arc<SourceDocument>,
    tasks: Vec<ExportTask>,
    background: Color,
    flattener: Option<Arc<Ghostscript>>,
    workers: usize,
) -> Vec<Outcome> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let bytes = Arc::clone(source.bytes());
    let source_ppi = source.source_ppi();

    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| {
            let index = task.index;
            let path = task.path.clone();
            let handle = tokio::spawn(run_isolated_task(
                Arc::clone(&semaphore),
                Arc::clone(&exporter.renderer),
                Arc::clone(&exporter.sink),
                Arc::clone(&bytes),
                source_ppi,
                task,
                background,
                flattener.clone(),
            ));
            (index, path, handle)
        })
        .collect();

    // Awaiting in task order keeps the report stable whatever finishes first
    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, path, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        };
        outcomes.push((index, path, outcome));
    }
    outcomes
}

/// Render with the run's shared source handle
async fn render_shared<R: Renderer>(
    renderer: Arc<R>,
    source: Arc<SourceDocument>,
    job: RenderJob,
) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || renderer.render(&source, &job)).await?
}

/// One concurrent task: wait for a worker slot, decode a private copy of the
/// source, render and write.
async fn run_isolated_task<R: Renderer, S: Sink>(
    semaphore: Arc<Semaphore>,
    renderer: Arc<R>,
    sink: Arc<S>,
    bytes: Arc<Vec<u8>>,
    source_ppi: f64,
    task: ExportTask,
    background: Color,
    flattener: Option<Arc<Ghostscript>>,
) -> Result<()> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| ResizeError::Render(e.to_string()))?;
    log::debug!("Rendering task {} -> {}", task.index, task.path.display());

    let job = task.render_job(background);
    let rendered = tokio::task::spawn_blocking(move || {
        let source = SourceDocument::open_shared(bytes, source_ppi)?;
        renderer.render(&source, &job)
    })
    .await??;
    deliver(sink.as_ref(), flattener.as_deref(), &task, rendered).await
}

/// Flatten PDF output when asked to, then hand it to the sink
async fn deliver<S: Sink>(
    sink: &S,
    flattener: Option<&Ghostscript>,
    task: &ExportTask,
    bytes: Vec<u8>,
) -> Result<()> {
    let bytes = match flattener {
        Some(ghostscript) if task.format == OutputFormat::Pdf => {
            log::debug!("Flattening {}", task.path.display());
            ghostscript.flatten(bytes).await?
        }
        _ => bytes,
    };
    sink.write(&task.path, bytes).await
}
