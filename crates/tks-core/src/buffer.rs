//! Source buffer: the single owner of a script's text.
//!
//! Both views and the execution engine read and write the script exclusively through
//! [`SourceBuffer::raw_content`] and [`SourceBuffer::update_content`]. Writes to disk are
//! debounced: every update cancels the pending save task and schedules a new one.
//!
//! # Example
//!
//! ```no_run
//! use tks_core::{BufferOptions, SourceBuffer};
//!
//! # async fn demo() -> Result<(), tks_core::BufferError> {
//! let buffer = SourceBuffer::load("login.tks", BufferOptions::default()).await?;
//! buffer.update_content("步骤:\n返回\n");
//! buffer.save().await?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::BufferError;
use crate::line_ending::LineEnding;

/// Buffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Schedule a save after every update.
    pub autosave: bool,
    /// Quiet period before a scheduled save runs.
    pub autosave_delay: Duration,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            autosave: true,
            autosave_delay: Duration::from_secs(1),
        }
    }
}

/// Notifications emitted by a [`SourceBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// The file was read from disk.
    Loaded,
    /// The text was replaced.
    ContentChanged {
        /// Version after the change.
        version: u64,
    },
    /// The text was written to disk.
    Saved {
        /// Target file.
        path: PathBuf,
    },
    /// Writing failed. The buffer stays dirty.
    SaveFailed {
        /// Error message.
        message: String,
    },
}

/// Buffer event callback.
pub type BufferEventCallback = Arc<dyn Fn(&BufferEvent) + Send + Sync>;

struct BufferState {
    path: PathBuf,
    content: String,
    line_ending: LineEnding,
    dirty: bool,
    version: u64,
    pending_save: Option<JoinHandle<()>>,
    callbacks: Vec<BufferEventCallback>,
}

/// Shared handle to the canonical text of one open script.
///
/// Cloning yields another handle to the same buffer.
#[derive(Clone)]
pub struct SourceBuffer {
    state: Arc<Mutex<BufferState>>,
    options: BufferOptions,
}

impl std::fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SourceBuffer")
            .field("path", &state.path)
            .field("dirty", &state.dirty)
            .field("version", &state.version)
            .finish()
    }
}

impl SourceBuffer {
    /// Create a clean buffer for `path` holding `content`. Nothing is read from disk.
    pub fn new(path: impl Into<PathBuf>, content: &str, options: BufferOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                path: path.into(),
                content: LineEnding::normalize(content),
                line_ending: LineEnding::detect_in_text(content),
                dirty: false,
                version: 0,
                pending_save: None,
                callbacks: Vec::new(),
            })),
            options,
        }
    }

    /// Read `path` into a new buffer.
    pub async fn load(path: impl AsRef<Path>, options: BufferOptions) -> Result<Self, BufferError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| {
            warn!(path = %path.display(), error = %source, "failed to load script");
            BufferError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(path = %path.display(), bytes = raw.len(), "script loaded");
        Ok(Self::new(path, &raw, options))
    }

    /// Buffer options.
    pub fn options(&self) -> BufferOptions {
        self.options
    }

    /// File this buffer saves to.
    pub fn path(&self) -> PathBuf {
        lock(&self.state).path.clone()
    }

    /// Current LF-normalized text.
    pub fn raw_content(&self) -> String {
        lock(&self.state).content.clone()
    }

    /// Whether the text changed since the last successful save.
    pub fn is_dirty(&self) -> bool {
        lock(&self.state).dirty
    }

    /// Monotonic content version, bumped by every update.
    pub fn version(&self) -> u64 {
        lock(&self.state).version
    }

    /// Line ending used when writing the file.
    pub fn line_ending(&self) -> LineEnding {
        lock(&self.state).line_ending
    }

    /// Register a callback for buffer events.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&BufferEvent) + Send + Sync + 'static,
    {
        lock(&self.state).callbacks.push(Arc::new(callback));
    }

    /// Replace the text, mark dirty and (re)schedule the debounced save.
    ///
    /// Scheduling needs a Tokio runtime; outside one the buffer only becomes dirty and waits for
    /// an explicit [`save`](Self::save).
    pub fn update_content(&self, text: &str) {
        let text = LineEnding::normalize(text);
        let (version, callbacks) = {
            let mut state = lock(&self.state);
            state.content = text;
            state.dirty = true;
            state.version += 1;

            if let Some(pending) = state.pending_save.take() {
                pending.abort();
            }
            if self.options.autosave
                && let Ok(runtime) = tokio::runtime::Handle::try_current()
            {
                let shared = Arc::clone(&self.state);
                let delay = self.options.autosave_delay;
                state.pending_save = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = write_to_disk(&shared, false).await {
                        warn!(error = %err, "debounced save failed");
                    }
                }));
            }
            (state.version, state.callbacks.clone())
        };
        emit(&callbacks, &BufferEvent::ContentChanged { version });
    }

    /// Write the text to disk if dirty. Cancels any pending debounced save.
    pub async fn save(&self) -> Result<(), BufferError> {
        self.cancel_pending();
        write_to_disk(&self.state, false).await
    }

    /// Write the text to disk even when it is clean.
    pub async fn force_save(&self) -> Result<(), BufferError> {
        self.cancel_pending();
        write_to_disk(&self.state, true).await
    }

    /// Cancel the pending save and drop all callbacks.
    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        if let Some(pending) = state.pending_save.take() {
            pending.abort();
        }
        state.callbacks.clear();
        debug!(path = %state.path.display(), dirty = state.dirty, "buffer disposed");
    }

    fn cancel_pending(&self) {
        if let Some(pending) = lock(&self.state).pending_save.take() {
            pending.abort();
        }
    }

    /// Re-read the file, discarding unsaved changes.
    pub async fn reload(&self) -> Result<(), BufferError> {
        self.cancel_pending();
        let path = self.path();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| BufferError::Read {
                path: path.clone(),
                source,
            })?;

        let callbacks = {
            let mut state = lock(&self.state);
            state.content = LineEnding::normalize(&raw);
            state.line_ending = LineEnding::detect_in_text(&raw);
            state.dirty = false;
            state.version += 1;
            state.callbacks.clone()
        };
        debug!(path = %path.display(), "script reloaded");
        emit(&callbacks, &BufferEvent::Loaded);
        Ok(())
    }
}

async fn write_to_disk(shared: &Arc<Mutex<BufferState>>, force: bool) -> Result<(), BufferError> {
    let (path, data, version) = {
        let state = lock(shared);
        if !state.dirty && !force {
            return Ok(());
        }
        (
            state.path.clone(),
            state.line_ending.apply_to_text(&state.content),
            state.version,
        )
    };

    let result = tokio::fs::write(&path, data).await;

    let callbacks = {
        let mut state = lock(shared);
        // An update that raced the write keeps the buffer dirty.
        if result.is_ok() && state.version == version {
            state.dirty = false;
        }
        state.callbacks.clone()
    };

    match result {
        Ok(()) => {
            debug!(path = %path.display(), version, "script saved");
            emit(&callbacks, &BufferEvent::Saved { path });
            Ok(())
        }
        Err(source) => {
            warn!(path = %path.display(), error = %source, "failed to save script");
            emit(
                &callbacks,
                &BufferEvent::SaveFailed {
                    message: source.to_string(),
                },
            );
            Err(BufferError::Write { path, source })
        }
    }
}

fn emit(callbacks: &[BufferEventCallback], event: &BufferEvent) {
    for callback in callbacks {
        callback(event);
    }
}

fn lock(state: &Mutex<BufferState>) -> MutexGuard<'_, BufferState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
