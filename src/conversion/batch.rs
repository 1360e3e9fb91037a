use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::runner::{convert_one, CommandExecutor, RunContext};
use super::{ConversionOutcome, OutcomeKind, RunConfig, TextureTask, OCIO_ENV_VAR, VALID_EXTENSIONS};
use crate::error::{BatchError, Result};
use crate::utils::has_valid_extension;

/// Notifications emitted while a batch runs, in order:
/// `Started`, then `Item` + `Progress` per completion, optionally `Cancelling`,
/// and always `Finished` when the run got past validation.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started { total: usize, workers: usize },
    Item(ConversionOutcome),
    Progress { done: usize, total: usize },
    Cancelling,
    Finished(BatchSummary),
}

/// Final tally, small enough to hand around by value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub done: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

/// Running totals for a batch, updated only by the controlling thread
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub done: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub workers: usize,
    pub elapsed: Duration,
    pub outcomes: Vec<ConversionOutcome>,
}

impl BatchResult {
    pub fn new(total: usize, workers: usize) -> Self {
        Self {
            total,
            done: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            cancelled: false,
            workers,
            elapsed: Duration::ZERO,
            outcomes: Vec::with_capacity(total),
        }
    }

    /// Count one outcome and return the new done count
    pub fn record(&mut self, outcome: ConversionOutcome) -> usize {
        self.done += 1;
        match outcome.kind {
            OutcomeKind::Converted => self.succeeded += 1,
            OutcomeKind::Skipped(_) => self.skipped += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
        self.done
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total,
            done: self.done,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            cancelled: self.cancelled,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// Get processing speed (items per second)
    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if self.done == 0 || secs == 0.0 {
            return 0.0;
        }
        self.done as f64 / secs
    }
}

/// One core is left for the controlling process
pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Collect the textures under `config.root` that should be handed to maketx
pub fn discover_textures(config: &RunConfig) -> Result<Vec<TextureTask>> {
    if !config.root.is_dir() {
        return Err(BatchError::RootNotFound(config.root.clone()));
    }

    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&config.root)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth);

    let filter = config.effective_filter();
    let mut files = Vec::new();

    for entry in walker {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() || !has_valid_extension(path, &VALID_EXTENSIONS) {
            continue;
        }
        if let Some(filter) = filter {
            if !entry.file_name().to_string_lossy().contains(filter) {
                continue;
            }
        }
        files.push(path.to_path_buf());
    }

    // Sort for consistent processing order
    files.sort();

    debug!(count = files.len(), root = %config.root.display(), "discovered textures");
    Ok(files.into_iter().map(TextureTask::new).collect())
}

/// Drives a whole folder through the converter on a bounded worker pool
pub struct BatchOrchestrator<E> {
    executor: E,
    env_color_config: Option<String>,
}

impl<E: CommandExecutor> BatchOrchestrator<E> {
    /// Captures `$OCIO` from the environment as the color config fallback
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            env_color_config: std::env::var(OCIO_ENV_VAR).ok(),
        }
    }

    /// Replace the `$OCIO` fallback captured at construction
    pub fn with_env_color_config(mut self, value: Option<String>) -> Self {
        self.env_color_config = value;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// An explicit file wins over `$OCIO`; both must exist
    pub fn resolve_color_config(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
            if !path.is_file() {
                return Err(BatchError::ColorConfigNotFound(path.to_path_buf()));
            }
            return Ok(path.to_path_buf());
        }

        let env_value = self
            .env_color_config
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(BatchError::ColorConfigUnset(OCIO_ENV_VAR))?;

        let path = PathBuf::from(env_value);
        if !path.exists() {
            return Err(BatchError::ColorConfigMissing {
                var: OCIO_ENV_VAR,
                path,
            });
        }
        Ok(path)
    }

    fn validate_converter(converter: &Path) -> Result<()> {
        if converter.as_os_str().is_empty() || !converter.exists() {
            return Err(BatchError::ConverterNotFound(converter.to_path_buf()));
        }
        Ok(())
    }

    /// Run a batch to completion on the calling thread.
    ///
    /// Fatal problems are returned before any conversion starts. After that,
    /// every per-texture problem ends up in the result instead. `cancel` is
    /// polled each time a conversion completes; conversions already running
    /// are allowed to finish but are no longer counted.
    pub fn run<F>(&self, config: &RunConfig, cancel: &AtomicBool, mut on_event: F) -> Result<BatchResult>
    where
        F: FnMut(BatchEvent),
    {
        let start_time = Instant::now();

        Self::validate_converter(&config.converter)?;
        let color_config = self.resolve_color_config(config.color_config.as_deref())?;

        let tasks = discover_textures(config)?;
        if tasks.is_empty() {
            return Err(BatchError::NoTextures);
        }

        let total = tasks.len();
        let workers = config.workers.filter(|&n| n > 0).unwrap_or_else(default_worker_count);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("maketx-{}", i))
            .build()?;

        let ctx = RunContext {
            color_config: Some(color_config),
            converter: config.converter.clone(),
            verbose: config.verbose,
        };

        info!(total, workers, root = %config.root.display(), "starting batch");
        on_event(BatchEvent::Started { total, workers });

        let mut result = BatchResult::new(total, workers);
        let executor = &self.executor;
        let ctx = &ctx;

        pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<ConversionOutcome>();

            for task in &tasks {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    // Queued work is dropped once a cancel is requested
                    if cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    let outcome = convert_one(task, ctx, executor);
                    let _ = tx.send(outcome);
                });
            }
            drop(tx);

            for outcome in rx.iter() {
                if cancel.load(Ordering::SeqCst) {
                    result.cancelled = true;
                    on_event(BatchEvent::Cancelling);
                    break;
                }
                let done = result.record(outcome.clone());
                on_event(BatchEvent::Item(outcome));
                on_event(BatchEvent::Progress { done, total });
            }
        });

        // Every remaining task saw the flag before starting
        if !result.cancelled && result.done < total && cancel.load(Ordering::SeqCst) {
            result.cancelled = true;
            on_event(BatchEvent::Cancelling);
        }

        result.elapsed = start_time.elapsed();
        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            cancelled = result.cancelled,
            "batch finished"
        );
        on_event(BatchEvent::Finished(result.summary()));
        Ok(result)
    }
}

impl<E: CommandExecutor + 'static> BatchOrchestrator<E> {
    /// Run the batch on a background thread, streaming events over a channel
    pub fn spawn(self, config: RunConfig) -> BatchHandle {
        let (tx, events) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let join = std::thread::spawn(move || {
            self.run(&config, &flag, |event| {
                let _ = tx.send(event);
            })
        });

        BatchHandle {
            events,
            cancel,
            join,
        }
    }
}

/// A batch running on its own thread
pub struct BatchHandle {
    pub events: Receiver<BatchEvent>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<Result<BatchResult>>,
}

impl BatchHandle {
    /// Ask the batch to stop after the conversions currently running
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Shared flag, e.g. for a signal handler
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the batch thread and return its result
    pub fn join(self) -> Result<BatchResult> {
        match self.join.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
