//! Dual-mode editor façade.
//!
//! [`DualModeEditor`] composes one [`SourceBuffer`] with a [`TextView`] and a [`BlockView`].
//! Edits from either view are turned into text and routed through the buffer; the visible view is
//! re-rendered from the buffer afterwards. Neither view is ever a second source of truth.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tks_lang::LanguageConfig;
use tracing::debug;

use crate::buffer::{BufferOptions, SourceBuffer};
use crate::command::Command;
use crate::error::{BufferError, EditError};
use crate::parser::{ScriptHeader, ScriptParser};
use crate::processing::{DocumentProcessor, ProcessingEdit};
use crate::projector::Projector;
use crate::view::{BlockView, LineMark, MarkOutcome, ScriptView, TextView};

/// Which view is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    /// Plain-text editing.
    Text,
    /// Block (form) editing.
    #[default]
    Block,
}

impl EditorMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Text => Self::Block,
            Self::Block => Self::Text,
        }
    }
}

/// An editor shared between the UI and the execution engine.
pub type SharedEditor = Arc<Mutex<DualModeEditor>>;

/// Lock a [`SharedEditor`], recovering from poisoning.
pub fn lock_editor(editor: &SharedEditor) -> MutexGuard<'_, DualModeEditor> {
    editor.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held for the duration of a structural block edit; see
/// [`DualModeEditor::begin_structural_edit`].
#[derive(Debug)]
pub struct StructuralEditGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for StructuralEditGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One open script with a text view and a block view over the same buffer.
#[derive(Debug)]
pub struct DualModeEditor {
    config: Arc<LanguageConfig>,
    buffer: SourceBuffer,
    mode: EditorMode,
    text_view: TextView,
    block_view: BlockView,
    locked: bool,
    mark: Option<LineMark>,
    structural_edit: Arc<AtomicBool>,
}

impl DualModeEditor {
    /// Wrap an existing buffer. The block view is rendered immediately.
    pub fn new(buffer: SourceBuffer, config: Arc<LanguageConfig>) -> Self {
        let mut editor = Self {
            config,
            buffer,
            mode: EditorMode::default(),
            text_view: TextView::new(),
            block_view: BlockView::new(),
            locked: false,
            mark: None,
            structural_edit: Arc::new(AtomicBool::new(false)),
        };
        editor.render_active();
        editor
    }

    /// Load `path` and open it in a new editor.
    pub async fn open(
        path: impl AsRef<Path>,
        options: BufferOptions,
        config: Arc<LanguageConfig>,
    ) -> Result<Self, BufferError> {
        let buffer = SourceBuffer::load(path, options).await?;
        Ok(Self::new(buffer, config))
    }

    /// Wrap in a [`SharedEditor`].
    pub fn into_shared(self) -> SharedEditor {
        Arc::new(Mutex::new(self))
    }

    /// Language table.
    pub fn config(&self) -> &LanguageConfig {
        &self.config
    }

    /// Another handle to the backing buffer, e.g. to save without holding the editor.
    pub fn buffer(&self) -> SourceBuffer {
        self.buffer.clone()
    }

    /// Active mode.
    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    /// Text view (rendered state is only current while it is the active view).
    pub fn text_view(&self) -> &TextView {
        &self.text_view
    }

    /// Block view (rendered state is only current while it is the active view).
    pub fn block_view(&self) -> &BlockView {
        &self.block_view
    }

    /// Make `target` the visible view, re-rendering it from the buffer.
    ///
    /// The current highlight, if any, is re-applied to the new view.
    pub fn switch_mode(&mut self, target: EditorMode) {
        debug!(from = ?self.mode, to = ?target, "switching editor mode");
        self.mode = target;
        self.render_active();
    }

    /// Switch to the other mode.
    pub fn toggle_mode(&mut self) {
        self.switch_mode(self.mode.toggled());
    }

    /// Current buffer text.
    pub fn content(&self) -> String {
        self.buffer.raw_content()
    }

    /// Whether the buffer has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.buffer.is_dirty()
    }

    /// Save the buffer.
    pub async fn save(&self) -> Result<(), BufferError> {
        self.buffer.save().await
    }

    /// Freshly projected command list.
    pub fn commands(&self) -> Vec<Command> {
        Projector::new(&self.config).project(&self.buffer.raw_content())
    }

    /// Header metadata of the script.
    pub fn header(&self) -> ScriptHeader {
        ScriptParser::new(&self.config).parse_header(&self.buffer.raw_content())
    }

    /// Replace the whole text (text-view edit). Unchanged text is a no-op.
    pub fn set_text(&mut self, text: &str) -> Result<(), EditError> {
        self.ensure_unlocked()?;
        if self.buffer.raw_content() == text {
            return Ok(());
        }
        self.commit(text);
        Ok(())
    }

    /// Append a command at the end of the steps section.
    pub fn append_command(&mut self, command: &Command) -> Result<(), EditError> {
        let _guard = self.begin_structural_edit()?;
        let text = Projector::new(&self.config).append(&self.buffer.raw_content(), command);
        self.commit(&text);
        Ok(())
    }

    /// Insert a command before the `index`-th command.
    pub fn insert_command(&mut self, command: &Command, index: usize) -> Result<(), EditError> {
        let _guard = self.begin_structural_edit()?;
        let text =
            Projector::new(&self.config).insert(&self.buffer.raw_content(), command, index)?;
        self.commit(&text);
        Ok(())
    }

    /// Remove the `index`-th command.
    pub fn remove_command(&mut self, index: usize) -> Result<(), EditError> {
        let _guard = self.begin_structural_edit()?;
        let text = Projector::new(&self.config).remove(&self.buffer.raw_content(), index)?;
        self.commit(&text);
        Ok(())
    }

    /// Move the `from`-th command before the command at `to`. Returns `false` for a no-op.
    pub fn reorder_commands(&mut self, from: usize, to: usize) -> Result<bool, EditError> {
        let _guard = self.begin_structural_edit()?;
        match Projector::new(&self.config).reorder(&self.buffer.raw_content(), from, to) {
            Some(text) => {
                self.commit(&text);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the `from`-th block on an insertion boundary (as returned by
    /// [`nearest_insertion_index`](crate::nearest_insertion_index)).
    ///
    /// A boundary after the last block moves the command to the end of the steps section.
    pub fn drop_block(&mut self, from: usize, boundary: usize) -> Result<bool, EditError> {
        let _guard = self.begin_structural_edit()?;
        let projector = Projector::new(&self.config);
        let current = self.buffer.raw_content();
        let count = projector.count(&current);

        if boundary < count {
            return match projector.reorder(&current, from, boundary) {
                Some(text) => {
                    self.commit(&text);
                    Ok(true)
                }
                None => Ok(false),
            };
        }
        if from + 1 >= count {
            return Ok(false);
        }
        let moved = projector
            .project(&current)
            .into_iter()
            .nth(from)
            .ok_or(EditError::IndexOutOfRange { index: from, count })?;
        let removed = projector.remove(&current, from)?;
        let text = projector.append(&removed, &moved);
        self.commit(&text);
        Ok(true)
    }

    /// Set the parameter `name` of the `index`-th command.
    pub fn update_param(&mut self, index: usize, name: &str, value: &str) -> Result<(), EditError> {
        let _guard = self.begin_structural_edit()?;
        let text =
            Projector::new(&self.config).update_param(&self.buffer.raw_content(), index, name, value)?;
        self.commit(&text);
        Ok(())
    }

    /// Claim the structural-edit slot.
    ///
    /// Block edits are mutually exclusive: while a guard is alive, every other structural edit
    /// fails with [`EditError::Busy`]. Hosts that apply an edit across several steps (a drag that
    /// spans frames) hold the guard for the whole gesture.
    pub fn begin_structural_edit(&self) -> Result<StructuralEditGuard, EditError> {
        self.ensure_unlocked()?;
        self.structural_edit
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| {
                debug!("structural edit rejected: another edit in flight");
                EditError::Busy
            })?;
        Ok(StructuralEditGuard {
            flag: Arc::clone(&self.structural_edit),
        })
    }

    /// Disable editing in both views.
    pub fn lock(&mut self) {
        self.set_locked(true);
    }

    /// Re-enable editing in both views.
    pub fn unlock(&mut self) {
        self.set_locked(false);
    }

    /// Whether editing is disabled.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Highlight `line_number` as executing in the active view.
    pub fn highlight_executing(&mut self, line_number: usize) -> MarkOutcome {
        self.highlight(LineMark::executing(line_number))
    }

    /// Highlight `line_number` as failed in the active view.
    pub fn highlight_error(&mut self, line_number: usize) -> MarkOutcome {
        self.highlight(LineMark::error(line_number))
    }

    /// Remove any highlight.
    pub fn clear_highlight(&mut self) {
        self.mark = None;
        self.text_view.clear_mark();
        self.block_view.clear_mark();
    }

    /// The remembered highlight.
    pub fn current_highlight(&self) -> Option<LineMark> {
        self.mark
    }

    /// Run a processor over the current text and apply its edits to the text view.
    pub fn run_processor<P>(&mut self, processor: &mut P) -> Result<bool, P::Error>
    where
        P: DocumentProcessor,
    {
        let edits = processor.process(&self.buffer.raw_content())?;
        Ok(self.apply_processing_edits(edits))
    }

    /// Apply derived-state edits to the text view.
    pub fn apply_processing_edits(&mut self, edits: Vec<ProcessingEdit>) -> bool {
        self.text_view.apply_processing_edits(edits)
    }

    /// Cancel pending saves and release buffer callbacks.
    pub fn dispose(&self) {
        self.buffer.dispose();
    }

    fn highlight(&mut self, mark: LineMark) -> MarkOutcome {
        let outcome = self.active_view_mut().mark_line(mark);
        match outcome {
            MarkOutcome::Applied => self.mark = Some(mark),
            MarkOutcome::Unchanged => {}
            MarkOutcome::Ignored => {
                debug!(line = mark.line_number, kind = ?mark.kind, "highlight request ignored");
            }
        }
        outcome
    }

    fn ensure_unlocked(&self) -> Result<(), EditError> {
        if self.locked {
            debug!("edit rejected: editor locked");
            return Err(EditError::Locked);
        }
        Ok(())
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        self.text_view.set_locked(locked);
        self.block_view.set_locked(locked);
    }

    fn commit(&mut self, text: &str) {
        self.buffer.update_content(text);
        self.render_active();
    }

    fn render_active(&mut self) {
        let text = self.buffer.raw_content();
        let config = Arc::clone(&self.config);
        let view = self.active_view_mut();
        view.render(&text, &config);
        if let Some(mark) = self.mark
            && self.active_view_mut().mark_line(mark) == MarkOutcome::Ignored
        {
            self.mark = None;
        }
    }

    fn active_view_mut(&mut self) -> &mut dyn ScriptView {
        match self.mode {
            EditorMode::Text => &mut self.text_view,
            EditorMode::Block => &mut self.block_view,
        }
    }
}
