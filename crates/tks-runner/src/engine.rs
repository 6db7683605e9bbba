//! Sequential execution engine.
//!
//! `Idle → Running → {Completed | Failed | Cancelled} → Idle`. Commands are dispatched strictly
//! one at a time; cancellation is a flag polled between steps, so a dispatched command always
//! runs to completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tks_core::{ScriptParser, SharedEditor, lock_editor};
use tracing::{debug, info};

use crate::device::DeviceCommander;
use crate::error::{PreconditionError, RunError};
use crate::observer::{Notice, RunObserver, TracingObserver};

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Pause after each successful step.
    pub step_pause: Duration,
    /// Refresh the device screen before each step.
    pub refresh_before_step: bool,
    /// Refresh the device screen after a completed run.
    pub refresh_after_run: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            step_pause: Duration::from_millis(300),
            refresh_before_step: true,
            refresh_after_run: true,
        }
    }
}

/// Where commands are executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Target device.
    pub device_id: Option<String>,
    /// Project root (locator and image libraries live there).
    pub project_path: Option<PathBuf>,
}

impl ExecutionContext {
    /// Context with both fields set.
    pub fn new(device_id: impl Into<String>, project_path: impl Into<PathBuf>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            project_path: Some(project_path.into()),
        }
    }

    fn resolve(&self) -> Result<(&str, &std::path::Path), PreconditionError> {
        let device = self
            .device_id
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(PreconditionError::MissingDevice)?;
        let project = self
            .project_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(PreconditionError::MissingProject)?;
        Ok((device, project))
    }
}

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Ready for a run.
    Idle,
    /// A run or single-line run is in progress.
    Running,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every command succeeded.
    Completed {
        /// Number of commands dispatched.
        steps: usize,
    },
    /// A command failed; nothing after it was dispatched.
    Failed {
        /// 1-based source line of the failing command.
        line_number: usize,
        /// Collaborator error message.
        message: String,
    },
    /// Stopped on request between two commands.
    Cancelled {
        /// Source line of the last dispatched command, if any.
        last_line: Option<usize>,
    },
}

/// One `(source line, command text)` pair of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    line_number: usize,
    text: String,
}

/// Handle that requests cancellation of the current run.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request cancellation. Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        self.cancel.store(true, Ordering::Release);
        true
    }
}

/// Resets the engine to idle (and unlocks the editor, if it was locked) however a run ends.
struct RunGuard {
    running: Arc<AtomicBool>,
    locked_editor: Option<SharedEditor>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(editor) = self.locked_editor.take() {
            lock_editor(&editor).unlock();
        }
        self.running.store(false, Ordering::Release);
    }
}

/// Runs the steps section of a script against a [`DeviceCommander`].
///
/// Cloning yields another handle to the same engine (shared state and flags).
#[derive(Clone)]
pub struct ExecutionEngine {
    commander: Arc<dyn DeviceCommander>,
    observer: Arc<dyn RunObserver>,
    options: EngineOptions,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl ExecutionEngine {
    /// Create an engine that reports to [`TracingObserver`].
    pub fn new(commander: Arc<dyn DeviceCommander>, options: EngineOptions) -> Self {
        Self {
            commander,
            observer: Arc::new(TracingObserver),
            options,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the observer.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Options.
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Handle for stopping the run from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancel: Arc::clone(&self.cancel),
            running: Arc::clone(&self.running),
        }
    }

    /// Request cancellation of the current run.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Run every command of the editor's script in order.
    ///
    /// Rejections ([`RunError`]) leave the engine idle and the editor untouched. Once running,
    /// the editor is locked until the returned future completes (or is dropped).
    pub async fn run(
        &self,
        editor: &SharedEditor,
        ctx: &ExecutionContext,
    ) -> Result<RunOutcome, RunError> {
        let mut guard = self.begin()?;
        let (device, project) = ctx.resolve().map_err(|err| self.reject(err))?;

        let steps = {
            let editor = lock_editor(editor);
            let content = editor.content();
            ScriptParser::new(editor.config())
                .command_lines(&content)
                .iter()
                .map(|line| Step {
                    line_number: line.line_number(),
                    text: line.text.trim().to_string(),
                })
                .collect::<Vec<_>>()
        };
        if steps.is_empty() {
            return Err(self.reject(PreconditionError::NoCommands));
        }

        {
            let mut locked = lock_editor(editor);
            locked.clear_highlight();
            locked.lock();
        }
        guard.locked_editor = Some(Arc::clone(editor));

        let started = Instant::now();
        let total = steps.len();
        info!(device, project = %project.display(), total, "run started");
        self.observer.script_started(total);

        let mut last_line = None;
        for (i, step) in steps.iter().enumerate() {
            if self.cancel.load(Ordering::Acquire) {
                return Ok(self.finish_cancelled(last_line, started));
            }

            if self.options.refresh_before_step {
                self.refresh().await;
                // A stop requested during the refresh must still prevent this dispatch.
                if self.cancel.load(Ordering::Acquire) {
                    return Ok(self.finish_cancelled(last_line, started));
                }
            }

            let step_no = i + 1;
            self.observer
                .step_started(step_no, total, step.line_number, &step.text);
            lock_editor(editor).highlight_executing(step.line_number);
            last_line = Some(step.line_number);

            let step_started = Instant::now();
            match self.dispatch(device, project, &step.text).await {
                Ok(()) => {
                    self.observer
                        .step_succeeded(step_no, step_started.elapsed());
                    tokio::time::sleep(self.options.step_pause).await;
                }
                Err(message) => {
                    lock_editor(editor).highlight_error(step.line_number);
                    self.observer.step_failed(step_no, &message);
                    let outcome = RunOutcome::Failed {
                        line_number: step.line_number,
                        message: message.clone(),
                    };
                    self.observer.notice(&Notice::Error(message));
                    self.observer.script_finished(&outcome, started.elapsed());
                    info!(line = step.line_number, "run failed");
                    return Ok(outcome);
                }
            }
        }

        // A stop requested during the last step still counts as an abort.
        if self.cancel.load(Ordering::Acquire) {
            return Ok(self.finish_cancelled(last_line, started));
        }

        if self.options.refresh_after_run {
            self.refresh().await;
        }
        lock_editor(editor).clear_highlight();
        let outcome = RunOutcome::Completed { steps: total };
        let elapsed = started.elapsed();
        self.observer.notice(&Notice::Success(format!(
            "script completed in {:.2}s",
            elapsed.as_secs_f64()
        )));
        self.observer.script_finished(&outcome, elapsed);
        info!(steps = total, "run completed");
        drop(guard);
        Ok(outcome)
    }

    /// Dispatch a single line (debug "run this line").
    ///
    /// Shares the busy state with [`run`](Self::run) but does not lock the editor. On success the
    /// highlight is cleared; on failure the line keeps an error mark.
    pub async fn run_line(
        &self,
        editor: &SharedEditor,
        ctx: &ExecutionContext,
        line_number: usize,
        text: &str,
    ) -> Result<RunOutcome, RunError> {
        let _guard = self.begin()?;
        let (device, project) = ctx.resolve().map_err(|err| self.reject(err))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(self.reject(PreconditionError::EmptyLine));
        }

        self.observer
            .notice(&Notice::Info(format!("line {line_number}: {text}")));
        lock_editor(editor).highlight_executing(line_number);

        let started = Instant::now();
        let outcome = match self.dispatch(device, project, text).await {
            Ok(()) => {
                self.observer.step_succeeded(1, started.elapsed());
                lock_editor(editor).clear_highlight();
                RunOutcome::Completed { steps: 1 }
            }
            Err(message) => {
                lock_editor(editor).highlight_error(line_number);
                self.observer.step_failed(1, &message);
                self.observer.notice(&Notice::Error(message.clone()));
                RunOutcome::Failed {
                    line_number,
                    message,
                }
            }
        };

        self.refresh().await;
        Ok(outcome)
    }

    fn begin(&self) -> Result<RunGuard, RunError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                self.observer
                    .notice(&Notice::Warning(RunError::Busy.to_string()));
                RunError::Busy
            })?;
        self.cancel.store(false, Ordering::Release);
        Ok(RunGuard {
            running: Arc::clone(&self.running),
            locked_editor: None,
        })
    }

    fn reject(&self, err: PreconditionError) -> RunError {
        debug!(error = %err, "run rejected");
        self.observer.notice(&Notice::Error(err.to_string()));
        RunError::Precondition(err)
    }

    /// Dispatch one line; any failure (reported or transport) becomes its message.
    async fn dispatch(
        &self,
        device: &str,
        project: &std::path::Path,
        text: &str,
    ) -> Result<(), String> {
        match self.commander.dispatch_command(device, project, text).await {
            Ok(result) if result.success => Ok(()),
            Ok(result) => Err(result
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "unknown error".to_string())),
            Err(err) => Err(err.to_string()),
        }
    }

    async fn refresh(&self) {
        if let Err(err) = self.commander.refresh_screen().await {
            debug!(error = %err, "screen refresh failed (ignored)");
        }
    }

    fn finish_cancelled(&self, last_line: Option<usize>, started: Instant) -> RunOutcome {
        let outcome = RunOutcome::Cancelled { last_line };
        let elapsed = started.elapsed();
        self.observer.notice(&Notice::Warning(format!(
            "script aborted after {:.2}s",
            elapsed.as_secs_f64()
        )));
        self.observer.script_finished(&outcome, elapsed);
        info!(?last_line, "run cancelled");
        outcome
    }
}
